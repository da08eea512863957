//! Commuter-rail safety services.
//!
//! The core is the crowd safety classifier ([`crowd`]): an uploaded
//! compartment photo is run through an external object detector, people are
//! counted and the count decides whether a constable is dispatched, requested,
//! or the request is rejected as over capacity. Alongside it live a station
//! crowd dataset lookup ([`stations`]), a feedback store ([`feedback`]) and an
//! event log ([`events`]).

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

pub mod api;
pub mod config;
pub mod crowd;
pub mod entity;
pub mod error;
pub mod events;
pub mod feedback;
pub mod stations;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
