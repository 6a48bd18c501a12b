// src/services/reminder_service.rs

use std::cmp::Reverse;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::{Executor, Sqlite};

use crate::{
    common::error::AppError,
    db::CrmRepository,
    models::{
        crm::{Customer, CustomerStatus},
        reminder::{Reminder, ReminderKind, Severity},
    },
};

/// Limites usados no cálculo. Vêm da configuração.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub followup_stale_days: i64,
    pub birthday_lookahead_days: i64,
    pub stall_pending_intake_days: i64,
    pub stall_ai_analyzing_days: i64,
    pub stall_proposal_ready_days: i64,
    pub stall_following_up_days: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            followup_stale_days: 14,
            birthday_lookahead_days: 7,
            stall_pending_intake_days: 7,
            stall_ai_analyzing_days: 3,
            stall_proposal_ready_days: 7,
            stall_following_up_days: 30,
        }
    }
}

impl ReminderPolicy {
    /// `None` para estados terminais, que nunca "travam".
    pub fn stall_threshold(&self, status: CustomerStatus) -> Option<i64> {
        match status {
            CustomerStatus::PendingIntake => Some(self.stall_pending_intake_days),
            CustomerStatus::AiAnalyzing => Some(self.stall_ai_analyzing_days),
            CustomerStatus::ProposalReady => Some(self.stall_proposal_ready_days),
            CustomerStatus::FollowingUp => Some(self.stall_following_up_days),
            CustomerStatus::Signed => None,
        }
    }
}

/// Sequência finita de lembretes, já ordenada. Pode ser percorrida quantas vezes quiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminders {
    items: Vec<Reminder>,
}

impl Reminders {
    pub fn iter(&self) -> std::slice::Iter<'_, Reminder> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Reminder> {
        self.items
    }
}

impl<'a> IntoIterator for &'a Reminders {
    type Item = &'a Reminder;
    type IntoIter = std::slice::Iter<'a, Reminder>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Reminders {
    type Item = Reminder;
    type IntoIter = std::vec::IntoIter<Reminder>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Função pura: mesmos clientes + mesmo relógio = mesma saída.
pub fn compute_reminders(customers: &[Customer], now: DateTime<Utc>, policy: &ReminderPolicy) -> Reminders {
    let today = now.date_naive();

    let mut items: Vec<Reminder> = customers
        .iter()
        .flat_map(|customer| {
            [
                stale_followup(customer, today, policy),
                birthday(customer, today, policy),
                status_stalled(customer, today, policy),
                follow_up_due(customer, today),
            ]
            .into_iter()
            .flatten()
        })
        .collect();

    items.sort_by_key(|r| (Reverse(r.severity), Reverse(r.kind.elapsed_days()), r.customer_id, r.kind.name()));

    Reminders { items }
}

fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

fn stale_followup(customer: &Customer, today: NaiveDate, policy: &ReminderPolicy) -> Option<Reminder> {
    if customer.status != CustomerStatus::FollowingUp {
        return None;
    }
    let elapsed = days_between(customer.updated_at.date_naive(), today);
    if elapsed <= policy.followup_stale_days {
        return None;
    }
    let severity = if elapsed >= policy.followup_stale_days * 2 {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(Reminder {
        customer_id: customer.id,
        customer_name: customer.name.clone(),
        kind: ReminderKind::StaleFollowup { elapsed_days: elapsed },
        detail: format!("No follow-up activity for {elapsed} days"),
        severity,
    })
}

/// Próxima ocorrência do aniversário a partir de `today` (ano ignorado).
/// 29/02 cai em 28/02 nos anos não bissextos.
pub fn next_birthday(birthday: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let in_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day() - 1))
    };
    let this_year = in_year(today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        in_year(today.year() + 1)
    }
}

fn birthday(customer: &Customer, today: NaiveDate, policy: &ReminderPolicy) -> Option<Reminder> {
    let date = next_birthday(customer.birthday?, today)?;
    let days_until = days_between(today, date);
    if days_until > policy.birthday_lookahead_days {
        return None;
    }
    let is_today = days_until == 0;
    let detail = match days_until {
        0 => "Birthday today".to_string(),
        1 => "Birthday tomorrow".to_string(),
        n => format!("Birthday in {n} days"),
    };
    Some(Reminder {
        customer_id: customer.id,
        customer_name: customer.name.clone(),
        kind: ReminderKind::Birthday { days_until, is_today, date },
        detail,
        severity: if is_today { Severity::Medium } else { Severity::Low },
    })
}

fn status_stalled(customer: &Customer, today: NaiveDate, policy: &ReminderPolicy) -> Option<Reminder> {
    let threshold = policy.stall_threshold(customer.status)?;
    let elapsed = days_between(customer.status_changed_at.date_naive(), today);
    if elapsed <= threshold {
        return None;
    }
    // Análise de IA travada indica pipeline quebrado.
    let severity = if customer.status == CustomerStatus::AiAnalyzing {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(Reminder {
        customer_id: customer.id,
        customer_name: customer.name.clone(),
        kind: ReminderKind::StatusStalled {
            status: customer.status,
            elapsed_days: elapsed,
            threshold_days: threshold,
        },
        detail: format!("Stuck in '{}' for {elapsed} days (limit {threshold})", customer.status),
        severity,
    })
}

fn follow_up_due(customer: &Customer, today: NaiveDate) -> Option<Reminder> {
    let due_date = customer.next_follow_up?;
    if customer.status == CustomerStatus::Signed || due_date > today {
        return None;
    }
    let overdue_days = days_between(due_date, today);
    let (detail, severity) = if overdue_days == 0 {
        ("Follow-up due today".to_string(), Severity::Medium)
    } else {
        (format!("Follow-up overdue by {overdue_days} days"), Severity::High)
    };
    Some(Reminder {
        customer_id: customer.id,
        customer_name: customer.name.clone(),
        kind: ReminderKind::FollowUpDue { due_date, overdue_days },
        detail,
        severity,
    })
}

#[derive(Clone)]
pub struct ReminderService {
    repo: CrmRepository,
    policy: ReminderPolicy,
}

impl ReminderService {
    pub fn new(repo: CrmRepository, policy: ReminderPolicy) -> Self {
        Self { repo, policy }
    }

    /// Calculado a cada pedido; nada é persistido.
    pub async fn reminders<'e, E>(&self, executor: E, now: DateTime<Utc>) -> Result<Reminders, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let customers = self.repo.all_customers(executor).await?;
        Ok(compute_reminders(&customers, now, &self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0).unwrap()
    }

    fn customer(name: &str, status: CustomerStatus, last_touch: DateTime<Utc>) -> Customer {
        let mut c = Customer::new(name.to_string(), last_touch);
        c.status = status;
        c
    }

    #[test]
    fn stale_followup_after_twenty_days() {
        let c = customer("Wang", CustomerStatus::FollowingUp, now() - Duration::days(20));
        let reminders = compute_reminders(&[c], now(), &ReminderPolicy::default());

        let stale: Vec<_> = reminders
            .iter()
            .filter(|r| matches!(r.kind, ReminderKind::StaleFollowup { .. }))
            .collect();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].kind, ReminderKind::StaleFollowup { elapsed_days: 20 });
        assert_eq!(reminders.len(), 1);
    }

    #[test]
    fn followup_at_threshold_is_not_stale() {
        let c = customer("Li", CustomerStatus::FollowingUp, now() - Duration::days(14));
        assert!(compute_reminders(&[c], now(), &ReminderPolicy::default()).is_empty());
    }

    #[test]
    fn birthday_today_and_at_lookahead_boundary() {
        let policy = ReminderPolicy::default();
        let mut today = customer("Today", CustomerStatus::Signed, now());
        today.birthday = NaiveDate::from_ymd_opt(1980, 6, 15);
        let mut edge = customer("Edge", CustomerStatus::Signed, now());
        edge.birthday = NaiveDate::from_ymd_opt(1975, 6, 22);
        let mut outside = customer("Outside", CustomerStatus::Signed, now());
        outside.birthday = NaiveDate::from_ymd_opt(1975, 6, 23);

        let reminders = compute_reminders(&[today, edge, outside], now(), &policy);
        let by_name = |n: &str| reminders.iter().find(|r| r.customer_name == n).map(|r| r.kind.clone());

        assert!(matches!(by_name("Today"), Some(ReminderKind::Birthday { is_today: true, days_until: 0, .. })));
        assert!(matches!(by_name("Edge"), Some(ReminderKind::Birthday { is_today: false, days_until: 7, .. })));
        assert_eq!(by_name("Outside"), None);
    }

    #[test]
    fn birthday_wraps_into_next_year() {
        let new_year_eve = Utc.with_ymd_and_hms(2025, 12, 29, 0, 0, 0).unwrap();
        let mut c = customer("Jan", CustomerStatus::Signed, new_year_eve);
        c.birthday = NaiveDate::from_ymd_opt(1990, 1, 2);
        let reminders = compute_reminders(&[c], new_year_eve, &ReminderPolicy::default());
        assert!(matches!(
            reminders.iter().next().map(|r| &r.kind),
            Some(ReminderKind::Birthday { days_until: 4, .. })
        ));
    }

    #[test]
    fn leap_day_birthday_falls_on_feb_28() {
        let today = NaiveDate::from_ymd_opt(2025, 2, 27).unwrap();
        let leap = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        assert_eq!(next_birthday(leap, today), NaiveDate::from_ymd_opt(2025, 2, 28));
        let leap_year_today = NaiveDate::from_ymd_opt(2028, 2, 27).unwrap();
        assert_eq!(next_birthday(leap, leap_year_today), NaiveDate::from_ymd_opt(2028, 2, 29));
    }

    #[test]
    fn stalled_analysis_is_high_and_signed_never_stalls() {
        let stuck = customer("Stuck", CustomerStatus::AiAnalyzing, now() - Duration::days(4));
        let done = customer("Done", CustomerStatus::Signed, now() - Duration::days(400));
        let reminders = compute_reminders(&[stuck, done], now(), &ReminderPolicy::default());

        assert_eq!(reminders.len(), 1);
        let r = reminders.iter().next().unwrap();
        assert_eq!(r.severity, Severity::High);
        assert_eq!(
            r.kind,
            ReminderKind::StatusStalled { status: CustomerStatus::AiAnalyzing, elapsed_days: 4, threshold_days: 3 }
        );
    }

    #[test]
    fn ordered_by_severity_then_elapsed() {
        let policy = ReminderPolicy::default();
        let mid = customer("Mid", CustomerStatus::FollowingUp, now() - Duration::days(16));
        let long = customer("Long", CustomerStatus::FollowingUp, now() - Duration::days(20));
        let high = customer("High", CustomerStatus::FollowingUp, now() - Duration::days(29));
        let mut bday = customer("Bday", CustomerStatus::Signed, now());
        bday.birthday = NaiveDate::from_ymd_opt(1970, 6, 17);

        let reminders = compute_reminders(&[bday, mid, high, long], now(), &policy);
        let order: Vec<_> = reminders.iter().map(|r| r.customer_name.as_str()).collect();
        assert_eq!(order, vec!["High", "Long", "Mid", "Bday"]);
    }

    #[test]
    fn recomputing_is_idempotent_and_restartable() {
        let mut a = customer("A", CustomerStatus::PendingIntake, now() - Duration::days(10));
        a.next_follow_up = NaiveDate::from_ymd_opt(2025, 6, 10);
        a.birthday = NaiveDate::from_ymd_opt(1988, 6, 18);
        let b = customer("B", CustomerStatus::FollowingUp, now() - Duration::days(40));
        let customers = vec![a, b];

        let first = compute_reminders(&customers, now(), &ReminderPolicy::default());
        let second = compute_reminders(&customers, now(), &ReminderPolicy::default());
        assert_eq!(first, second);

        let pass_one: Vec<_> = first.iter().cloned().collect();
        let pass_two: Vec<_> = (&first).into_iter().cloned().collect();
        assert_eq!(pass_one, pass_two);
        assert_eq!(pass_one.len(), 5);
    }

    #[test]
    fn follow_up_due_ignores_signed_and_future_dates() {
        let mut signed = customer("Signed", CustomerStatus::Signed, now());
        signed.next_follow_up = NaiveDate::from_ymd_opt(2025, 6, 1);
        let mut future = customer("Future", CustomerStatus::ProposalReady, now());
        future.next_follow_up = NaiveDate::from_ymd_opt(2025, 6, 20);
        let mut due = customer("Due", CustomerStatus::ProposalReady, now());
        due.next_follow_up = NaiveDate::from_ymd_opt(2025, 6, 15);

        let reminders = compute_reminders(&[signed, future, due], now(), &ReminderPolicy::default());
        assert_eq!(reminders.len(), 1);
        let r = reminders.into_vec().remove(0);
        assert_eq!(r.customer_name, "Due");
        assert_eq!(r.severity, Severity::Medium);
    }
}
