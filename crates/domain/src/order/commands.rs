//! Commands accepted by the order service.
//!
//! Commands are validated before any store access; a rejected command leaves
//! no trace in the store.

use common::{LocationId, OrderId};
use serde::{Deserialize, Serialize};

use super::{Contact, Money, OrderError, OrderItem, OrderStatus, ProductId};

/// One requested line on a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,

    /// Surcharge from selected options for the whole line.
    #[serde(default)]
    pub options_total: Money,
}

impl NewOrderItem {
    fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: self.product_id.clone(),
                quantity: self.quantity,
            });
        }
        if self.unit_price.cents() < 0 {
            return Err(OrderError::InvalidPrice {
                product_id: self.product_id.clone(),
                price: self.unit_price,
            });
        }
        if self.options_total.cents() < 0 {
            return Err(OrderError::InvalidPrice {
                product_id: self.product_id.clone(),
                price: self.options_total,
            });
        }
        Ok(())
    }

    fn into_item(self) -> OrderItem {
        OrderItem {
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            unit_price: self.unit_price,
            options_total: self.options_total,
        }
    }
}

/// Command to place a new order at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub location_id: LocationId,
    pub items: Vec<NewOrderItem>,

    #[serde(default)]
    pub contact: Contact,
}

impl PlaceOrder {
    /// Validates the command and converts the requested lines into order
    /// items.
    pub fn into_items(self) -> Result<(Vec<OrderItem>, Contact), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &self.items {
            item.validate()?;
        }
        let items = self.items.into_iter().map(NewOrderItem::into_item).collect();
        Ok((items, self.contact))
    }
}

/// Command to move an order to a new lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Command to record a processor authorization hold on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAuthorization {
    pub order_id: OrderId,

    /// Processor reference for the hold.
    pub payment_intent: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, unit_cents: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: "latte".into(),
            product_name: "Latte".to_string(),
            quantity,
            unit_price: Money::from_cents(unit_cents),
            options_total: Money::zero(),
        }
    }

    #[test]
    fn empty_order_is_rejected() {
        let cmd = PlaceOrder {
            location_id: LocationId::new(),
            items: vec![],
            contact: Contact::none(),
        };
        assert!(matches!(cmd.into_items(), Err(OrderError::NoItems)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let cmd = PlaceOrder {
            location_id: LocationId::new(),
            items: vec![line(0, 450)],
            contact: Contact::none(),
        };
        assert!(matches!(
            cmd.into_items(),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn negative_price_is_rejected() {
        let cmd = PlaceOrder {
            location_id: LocationId::new(),
            items: vec![line(1, -450)],
            contact: Contact::none(),
        };
        assert!(matches!(
            cmd.into_items(),
            Err(OrderError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn valid_command_yields_items() {
        let cmd = PlaceOrder {
            location_id: LocationId::new(),
            items: vec![line(2, 450)],
            contact: Contact::email("a@b.fi"),
        };
        let (items, contact) = cmd.into_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_price().cents(), 900);
        assert_eq!(contact.email.as_deref(), Some("a@b.fi"));
    }
}
