// src/models/reminder.rs

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::crm::CustomerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReminderKind {
    StaleFollowup {
        elapsed_days: i64,
    },
    Birthday {
        days_until: i64,
        is_today: bool,
        #[schema(value_type = String, format = Date)]
        date: NaiveDate,
    },
    StatusStalled {
        status: CustomerStatus,
        elapsed_days: i64,
        threshold_days: i64,
    },
    FollowUpDue {
        #[schema(value_type = String, format = Date)]
        due_date: NaiveDate,
        overdue_days: i64,
    },
}

impl ReminderKind {
    /// Chave de ordenação secundária: quanto maior, mais urgente.
    /// Aniversários contam ao contrário (o mais próximo vem primeiro).
    pub fn elapsed_days(&self) -> i64 {
        match self {
            ReminderKind::StaleFollowup { elapsed_days } => *elapsed_days,
            ReminderKind::Birthday { days_until, .. } => -days_until,
            ReminderKind::StatusStalled { elapsed_days, .. } => *elapsed_days,
            ReminderKind::FollowUpDue { overdue_days, .. } => *overdue_days,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReminderKind::StaleFollowup { .. } => "stale_followup",
            ReminderKind::Birthday { .. } => "birthday",
            ReminderKind::StatusStalled { .. } => "status_stalled",
            ReminderKind::FollowUpDue { .. } => "follow_up_due",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub customer_id: Uuid,
    pub customer_name: String,
    #[serde(flatten)]
    pub kind: ReminderKind,
    pub detail: String,
    pub severity: Severity,
}
