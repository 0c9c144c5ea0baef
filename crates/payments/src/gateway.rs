//! Client for a Razorpay-style orders API.

use reqwest::StatusCode;

use crate::{
    validate, Checkout, Error, GatewayOrder, OrderRequest, PaymentGateway,
};

pub const DEFAULT_API_BASE: &str = "https://api.razorpay.com";
pub const DEFAULT_CHECKOUT_SCRIPT: &str =
    "https://checkout.razorpay.com/v1/checkout.js";

pub struct HostedGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
    checkout_script: String,
}

impl HostedGateway {
    pub fn new(
        api_base: &str,
        key_id: String,
        key_secret: String,
        checkout_script: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
            checkout_script,
        }
    }

    async fn parse(response: reqwest::Response) -> Result<GatewayOrder, Error> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let url = response.url().to_string();
            return Err(Error::UnknownOrder(url));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<GatewayOrder>().await?)
    }
}

#[rocket::async_trait]
impl PaymentGateway for HostedGateway {
    #[tracing::instrument(skip(self))]
    async fn create_order(
        &self,
        request: &OrderRequest,
    ) -> Result<GatewayOrder, Error> {
        validate(request)?;

        let response = self
            .client
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await?;

        let order = Self::parse(response).await?;
        tracing::info!(order_id = %order.id, "created gateway order");
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, Error> {
        let response = self
            .client
            .get(format!("{}/v1/orders/{order_id}", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        Self::parse(response).await
    }

    fn checkout(&self) -> Checkout {
        Checkout::Hosted {
            key_id: self.key_id.clone(),
            script_url: self.checkout_script.clone(),
        }
    }

    fn signing_secret(&self) -> &str {
        &self.key_secret
    }
}
