//! Notification fan-out for one product status change.
//!
//! [`NotificationFanout::notify`] resolves the subscribers of a product,
//! filters and throttles their alerts, delivers one multicast push per event,
//! stamps the alerts, records one notification row per user and optionally
//! emails users who opted in. Delivery failures are tallied in the returned
//! [`FanoutReport`]. Storage failures before delivery abort the call; those
//! after delivery are listed in [`FanoutReport::failed_records`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use medwatch_core::alerts::{
    alert_type_matches, is_throttled, notification_data, status_template,
};
use medwatch_core::change_detection::ChangeEvent;
use medwatch_core::channels::{CHANNEL_IN_APP, CHANNEL_PUSH};
use medwatch_core::types::DbId;
use medwatch_db::models::notification::CreateNotification;
use medwatch_db::repositories::{AlertRepo, NotificationRepo, PushTokenRepo, UserRepo};
use serde::Serialize;
use sqlx::PgPool;

use crate::delivery::email::EmailDelivery;
use crate::delivery::push::{PushBatchResult, PushMessage, PushSender};

/// Error type for fan-out failures that prevent processing an event.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A storage write that failed after delivery had already happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    /// What was being written, e.g. `notification user 12`.
    pub item: String,
    pub error: String,
}

impl FailedRecord {
    fn new(item: String, error: impl ToString) -> Self {
        Self {
            item,
            error: error.to_string(),
        }
    }
}

/// Tallies for one or more fanned-out events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    /// Alerts matching the event after type filtering and dedupe.
    pub matched_alerts: usize,
    /// Matched alerts skipped because they fired too recently.
    pub throttled_alerts: usize,
    pub notified_users: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Push tokens and email addresses whose delivery failed.
    pub failed_endpoints: Vec<String>,
    pub failed_records: Vec<FailedRecord>,
}

impl FanoutReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: FanoutReport) {
        self.matched_alerts += other.matched_alerts;
        self.throttled_alerts += other.throttled_alerts;
        self.notified_users += other.notified_users;
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.failed_endpoints.extend(other.failed_endpoints);
        self.failed_records.extend(other.failed_records);
    }
}

/// Distributes status change events to subscribed users.
#[derive(Clone)]
pub struct NotificationFanout {
    pool: PgPool,
    push: Arc<dyn PushSender>,
    email: Option<Arc<EmailDelivery>>,
    min_interval: chrono::Duration,
}

impl NotificationFanout {
    /// Create a fan-out engine with push delivery only and no throttling.
    pub fn new(pool: PgPool, push: Arc<dyn PushSender>) -> Self {
        Self {
            pool,
            push,
            email: None,
            min_interval: chrono::Duration::zero(),
        }
    }

    /// Also email users whose `email_enabled` flag is set.
    pub fn with_email(mut self, email: Arc<EmailDelivery>) -> Self {
        self.email = Some(email);
        self
    }

    /// Skip alerts notified less than `min_interval` ago. Zero disables.
    pub fn with_min_interval(mut self, min_interval: chrono::Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Fan out one change event.
    pub async fn notify(&self, event: &ChangeEvent) -> Result<FanoutReport, FanoutError> {
        let mut report = FanoutReport::default();
        let now = Utc::now();

        let alerts = AlertRepo::list_active_for_product(&self.pool, event.product_id).await?;
        let mut seen: HashSet<DbId> = HashSet::new();
        let matched: Vec<_> = alerts
            .into_iter()
            .filter(|a| alert_type_matches(&a.alert_type, event.new_status))
            .filter(|a| seen.insert(a.id))
            .collect();
        report.matched_alerts = matched.len();

        let (throttled, due): (Vec<_>, Vec<_>) = matched
            .into_iter()
            .partition(|a| is_throttled(a.last_notified_at, now, self.min_interval));
        report.throttled_alerts = throttled.len();
        if due.is_empty() {
            return Ok(report);
        }

        let alert_ids: Vec<DbId> = due.iter().map(|a| a.id).collect();
        let mut user_ids: Vec<DbId> = due.iter().map(|a| a.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let users = UserRepo::list_delivery_prefs(&self.pool, &user_ids).await?;
        let push_user_ids: Vec<DbId> = users
            .iter()
            .filter(|u| u.push_enabled)
            .map(|u| u.id)
            .collect();
        let tokens = PushTokenRepo::list_active_for_users(&self.pool, &push_user_ids).await?;

        let mut tokens_by_user: BTreeMap<DbId, usize> = BTreeMap::new();
        let mut token_values: Vec<String> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            if !token_values.contains(&token.token) {
                token_values.push(token.token.clone());
                *tokens_by_user.entry(token.user_id).or_default() += 1;
            }
        }

        let template = status_template(event.new_status, &event.product_name);
        let data = notification_data(event.product_id, event.new_status, &event.product_name);

        if !token_values.is_empty() {
            let message = PushMessage {
                title: template.title.clone(),
                body: template.body.clone(),
                data: data.clone(),
            };
            let result = match self.push.send_multicast(&message, &token_values).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        product_id = event.product_id,
                        tokens = token_values.len(),
                        error = %e,
                        "Push multicast failed",
                    );
                    PushBatchResult::all_failed(&token_values)
                }
            };
            report.attempted += token_values.len();
            report.succeeded += result.success_count;
            report.failed += result.failure_count;
            report.failed_endpoints.extend(result.failed_tokens);

            if !result.unregistered_tokens.is_empty() {
                match PushTokenRepo::deactivate(&self.pool, &result.unregistered_tokens).await {
                    Ok(count) => tracing::info!(count, "Deactivated unregistered push tokens"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to deactivate push tokens");
                        report.failed_records.push(FailedRecord::new(
                            format!(
                                "push_tokens ({} unregistered)",
                                result.unregistered_tokens.len()
                            ),
                            e,
                        ));
                    }
                }
            }
        }

        AlertRepo::mark_notified(&self.pool, &alert_ids).await?;

        for user in &users {
            let channel = if tokens_by_user.contains_key(&user.id) {
                CHANNEL_PUSH
            } else {
                CHANNEL_IN_APP
            };
            let input = CreateNotification {
                user_id: user.id,
                product_id: event.product_id,
                channel: channel.to_string(),
                title: template.title.clone(),
                body: template.body.clone(),
                data: data.clone(),
            };
            match NotificationRepo::create(&self.pool, &input).await {
                Ok(_) => report.notified_users += 1,
                Err(e) => {
                    tracing::warn!(user_id = user.id, error = %e, "Failed to record notification");
                    report
                        .failed_records
                        .push(FailedRecord::new(format!("notification user {}", user.id), e));
                }
            }
        }

        if let Some(email) = &self.email {
            for user in users.iter().filter(|u| u.email_enabled) {
                report.attempted += 1;
                match email.deliver(&user.email, &template).await {
                    Ok(()) => report.succeeded += 1,
                    Err(e) => {
                        tracing::warn!(user_id = user.id, error = %e, "Email delivery failed");
                        report.failed += 1;
                        report.failed_endpoints.push(user.email.clone());
                    }
                }
            }
        }

        tracing::debug!(
            product_id = event.product_id,
            status = %event.new_status,
            matched = report.matched_alerts,
            notified = report.notified_users,
            "Fanned out status change",
        );
        Ok(report)
    }
}
