use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::mailer::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub notifier: Arc<dyn Notifier>,
}
