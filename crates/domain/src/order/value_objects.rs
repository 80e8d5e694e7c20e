//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// Product identifier (menu item reference).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Money amount represented in minor units (cents) to avoid floating point
/// issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major-unit portion (whole number).
    pub fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor-unit remainder after whole units.
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0 * quantity as i64)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Human-facing 4-digit order label, unique among existing orders.
///
/// Cosmetic only: never used for lookup or as a security token. The internal
/// [`common::OrderId`] is the real identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayId(i32);

impl DisplayId {
    /// Lowest valid display id.
    pub const MIN: i32 = 1000;

    /// Highest valid display id.
    pub const MAX: i32 = 9999;

    /// Creates a display id, coercing an out-of-range value into the 4-digit
    /// window by wrapping into `1000..=9999`.
    pub fn coerced(value: i32) -> Self {
        let mut v = value.rem_euclid(10_000);
        if v < Self::MIN {
            v += Self::MIN;
        }
        Self(v)
    }

    /// Creates a display id from a raw stored value.
    pub fn from_raw(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub fn value(&self) -> i32 {
        self.0
    }

    /// Returns true if the value sits in the 4-digit window.
    pub fn is_in_range(&self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }
}

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Customer contact information carried on an order.
///
/// Either channel may be absent; notification dispatch uses whatever is
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Customer email address, if provided at checkout.
    pub email: Option<String>,

    /// Customer phone number, if provided at checkout.
    pub phone: Option<String>,
}

impl Contact {
    /// Contact with neither channel.
    pub fn none() -> Self {
        Self::default()
    }

    /// Contact with an email address only.
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            phone: None,
        }
    }

    /// Contact with a phone number only.
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            email: None,
            phone: Some(phone.into()),
        }
    }

    /// Returns true when no channel is present.
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none()
    }
}

/// A line item on an order. Immutable after the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product ordered.
    pub product_id: ProductId,

    /// Human-readable product name at the time of ordering.
    pub product_name: String,

    /// Quantity ordered (always positive).
    pub quantity: u32,

    /// Price per unit at the time of ordering.
    pub unit_price: Money,

    /// Total surcharge from selected options/modifiers for the whole line.
    pub options_total: Money,
}

impl OrderItem {
    /// Creates a new order item with no option modifiers.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
            options_total: Money::zero(),
        }
    }

    /// Sets the option-modifier surcharge for the line.
    pub fn with_options_total(mut self, options_total: Money) -> Self {
        self.options_total = options_total;
        self
    }

    /// Returns the line total: unit price × quantity + option modifiers.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity) + self.options_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.units(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(100).to_string(), "1.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
    }

    #[test]
    fn money_sum() {
        let total: Money = [100, 200, 300].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 600);
    }

    #[test]
    fn display_id_coercion() {
        assert_eq!(DisplayId::coerced(4321).value(), 4321);
        assert_eq!(DisplayId::coerced(123).value(), 1123);
        assert_eq!(DisplayId::coerced(10_500).value(), 1500);
        assert!(DisplayId::coerced(0).is_in_range());
        assert!(DisplayId::coerced(999_999).is_in_range());
    }

    #[test]
    fn display_id_formats_with_hash() {
        assert_eq!(DisplayId::from_raw(1234).to_string(), "#1234");
    }

    #[test]
    fn contact_emptiness() {
        assert!(Contact::none().is_empty());
        assert!(!Contact::email("a@b.fi").is_empty());
        assert!(!Contact::phone("+358401234567").is_empty());
    }

    #[test]
    fn order_item_total_price() {
        let item = OrderItem::new("margherita", "Margherita", 3, Money::from_cents(1000));
        assert_eq!(item.total_price().cents(), 3000);

        let item = item.with_options_total(Money::from_cents(250));
        assert_eq!(item.total_price().cents(), 3250);
    }

    #[test]
    fn order_item_serialization() {
        let item = OrderItem::new("kebab", "Kebab", 2, Money::from_cents(999))
            .with_options_total(Money::from_cents(100));
        let json = serde_json::to_string(&item).unwrap();
        let deserialized: OrderItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, deserialized);
    }
}
