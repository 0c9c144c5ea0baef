//! A gateway that keeps its orders in memory. Used in development and in
//! tests, where no real money should change hands.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    validate, Checkout, Error, GatewayOrder, GatewayOrderStatus, OrderRequest,
    PaymentGateway,
};

pub struct OfflineGateway {
    secret: String,
    orders: Mutex<HashMap<String, GatewayOrder>>,
}

impl OfflineGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            orders: Mutex::new(HashMap::new()),
        }
    }

    /// Marks an order as paid, as if the participant had completed checkout
    /// but never returned to the portal.
    pub fn capture(&self, order_id: &str) -> Result<(), Error> {
        let mut orders = self.orders.lock();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| Error::UnknownOrder(order_id.to_string()))?;
        order.status = GatewayOrderStatus::Paid;
        Ok(())
    }
}

#[rocket::async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_order(
        &self,
        request: &OrderRequest,
    ) -> Result<GatewayOrder, Error> {
        validate(request)?;

        let order = GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: Some(request.receipt.clone()),
            status: GatewayOrderStatus::Created,
        };
        self.orders.lock().insert(order.id.clone(), order.clone());
        tracing::debug!(order_id = %order.id, "created offline order");
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, Error> {
        self.orders
            .lock()
            .get(order_id)
            .cloned()
            .ok_or_else(|| Error::UnknownOrder(order_id.to_string()))
    }

    fn checkout(&self) -> Checkout {
        Checkout::Offline {
            secret: self.secret.clone(),
        }
    }

    fn signing_secret(&self) -> &str {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: i64) -> OrderRequest {
        OrderRequest {
            amount,
            currency: "INR".to_string(),
            receipt: "rcpt_test_1".to_string(),
        }
    }

    #[rocket::async_test]
    async fn orders_can_be_captured_and_fetched() {
        let gateway = OfflineGateway::new("secret");
        let order = gateway.create_order(&request(25000)).await.unwrap();
        assert_eq!(order.status, GatewayOrderStatus::Created);

        gateway.capture(&order.id).unwrap();
        let fetched = gateway.fetch_order(&order.id).await.unwrap();
        assert_eq!(fetched.status, GatewayOrderStatus::Paid);
        assert_eq!(fetched.amount, 25000);
    }

    #[rocket::async_test]
    async fn free_orders_are_refused() {
        let gateway = OfflineGateway::new("secret");
        assert!(matches!(
            gateway.create_order(&request(0)).await,
            Err(Error::InvalidAmount(0))
        ));
        assert!(matches!(
            gateway.fetch_order("order_missing").await,
            Err(Error::UnknownOrder(_))
        ));
    }
}
