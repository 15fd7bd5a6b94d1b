use invoicing_service::config::InvoicingConfig;
use invoicing_service::services::MongoDb;
use invoicing_service::startup::Application;
use serde_json::json;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: MongoDb,
    pub db_name: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        if std::env::var("MONGODB_URI").is_err() {
            std::env::set_var("MONGODB_URI", "mongodb://localhost:27017");
        }

        let db_name = format!("invoicing_test_{}", Uuid::new_v4());

        let mut config = InvoicingConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.mongodb.database = db_name.clone();

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let db = app.db().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
        }
    }

    /// Create an invoice through the API and return its JSON representation.
    pub async fn create_invoice(
        &self,
        client_name: &str,
        items: serde_json::Value,
        tax_rate: &str,
        discount_rate: &str,
    ) -> serde_json::Value {
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/invoices", self.address))
            .json(&json!({
                "client_name": client_name,
                "items": items,
                "tax_rate": tax_rate,
                "discount_rate": discount_rate,
            }))
            .send()
            .await
            .expect("Failed to create invoice");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Invalid invoice JSON")
    }

    /// Cleanup test resources (drops the throwaway database).
    pub async fn cleanup(&self) {
        let _ = self.db.client().database(&self.db_name).drop(None).await;
    }
}
