//! Value-at-risk: money sitting in states that have not been approved yet.
//!
//! Tickets and change orders are bucketed by status. Draft and
//! pending-review tickets plus submitted change orders are "at risk";
//! anything waiting longer than [`OVERDUE_THRESHOLD_DAYS`] is also listed
//! as overdue.

use crate::model::ticket::whole_days_between;
use crate::model::{
    ChangeOrder, ChangeOrderId, ChangeOrderStatus, Project, ProjectId, Ticket, TicketId,
    TicketStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Days a pending-review ticket or submitted change order may wait before
/// it counts as overdue. Waiting exactly this long is not overdue.
pub const OVERDUE_THRESHOLD_DAYS: i64 = 14;

/// Count, value, and mean age of the tickets in one status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketBucket {
    pub count: usize,
    pub value: Decimal,
    pub avg_age_days: f64,
}

/// Tickets grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketBuckets {
    pub draft: TicketBucket,
    pub pending_review: TicketBucket,
    pub approved: TicketBucket,
    pub rejected: TicketBucket,
    pub billed: TicketBucket,
    pub paid: TicketBucket,
}

impl TicketBuckets {
    #[must_use]
    pub const fn get(&self, status: TicketStatus) -> &TicketBucket {
        match status {
            TicketStatus::Draft => &self.draft,
            TicketStatus::PendingReview => &self.pending_review,
            TicketStatus::Approved => &self.approved,
            TicketStatus::Rejected => &self.rejected,
            TicketStatus::Billed => &self.billed,
            TicketStatus::Paid => &self.paid,
        }
    }

    fn get_mut(&mut self, status: TicketStatus) -> &mut TicketBucket {
        match status {
            TicketStatus::Draft => &mut self.draft,
            TicketStatus::PendingReview => &mut self.pending_review,
            TicketStatus::Approved => &mut self.approved,
            TicketStatus::Rejected => &mut self.rejected,
            TicketStatus::Billed => &mut self.billed,
            TicketStatus::Paid => &mut self.paid,
        }
    }
}

/// Count and summed `current_amount` of the change orders in one status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeOrderBucket {
    pub count: usize,
    pub value: Decimal,
}

/// Change orders grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeOrderBuckets {
    pub draft: ChangeOrderBucket,
    pub submitted: ChangeOrderBucket,
    pub approved: ChangeOrderBucket,
    pub rejected: ChangeOrderBucket,
    /// Mean whole days since submission over submitted change orders.
    pub submitted_avg_days_pending: f64,
}

impl ChangeOrderBuckets {
    #[must_use]
    pub const fn get(&self, status: ChangeOrderStatus) -> &ChangeOrderBucket {
        match status {
            ChangeOrderStatus::Draft => &self.draft,
            ChangeOrderStatus::Submitted => &self.submitted,
            ChangeOrderStatus::Approved => &self.approved,
            ChangeOrderStatus::Rejected => &self.rejected,
        }
    }

    fn get_mut(&mut self, status: ChangeOrderStatus) -> &mut ChangeOrderBucket {
        match status {
            ChangeOrderStatus::Draft => &mut self.draft,
            ChangeOrderStatus::Submitted => &mut self.submitted,
            ChangeOrderStatus::Approved => &mut self.approved,
            ChangeOrderStatus::Rejected => &mut self.rejected,
        }
    }
}

/// Something that has waited too long for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverdueItem {
    Ticket {
        id: TicketId,
        project_id: ProjectId,
        amount: Decimal,
        days: i64,
    },
    ChangeOrder {
        id: ChangeOrderId,
        project_id: ProjectId,
        number: u32,
        amount: Decimal,
        days: i64,
    },
}

impl OverdueItem {
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        match self {
            Self::Ticket { amount, .. } | Self::ChangeOrder { amount, .. } => *amount,
        }
    }

    #[must_use]
    pub const fn days(&self) -> i64 {
        match self {
            Self::Ticket { days, .. } | Self::ChangeOrder { days, .. } => *days,
        }
    }
}

/// Ticket value per project, split by the statuses that matter for billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectExposure {
    pub project_id: ProjectId,
    pub project_code: Option<String>,
    pub project_name: Option<String>,
    pub draft: Decimal,
    pub pending: Decimal,
    pub approved: Decimal,
    /// All tickets, whatever their status.
    pub total: Decimal,
}

/// Portfolio-wide value-at-risk report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAtRiskReport {
    pub generated_at: DateTime<Utc>,
    pub tickets: TicketBuckets,
    pub change_orders: ChangeOrderBuckets,
    /// Draft and pending-review tickets plus submitted change orders.
    pub total_at_risk: Decimal,
    /// Approved tickets plus approved change orders.
    pub total_approved: Decimal,
    /// Oldest first.
    pub overdue: Vec<OverdueItem>,
    pub overdue_total_value: Decimal,
    pub by_project: Vec<ProjectExposure>,
}

/// Build the value-at-risk report as of `now`.
#[must_use]
pub fn value_at_risk(
    tickets: &[Ticket],
    change_orders: &[ChangeOrder],
    projects: &[Project],
    now: DateTime<Utc>,
) -> ValueAtRiskReport {
    let mut ticket_buckets = TicketBuckets::default();
    let mut ticket_ages: BTreeMap<TicketStatus, i64> = BTreeMap::new();
    let mut overdue = Vec::new();
    let mut exposure: BTreeMap<ProjectId, [Decimal; 4]> = BTreeMap::new();

    for ticket in tickets {
        let age = ticket.age_days(now);
        let bucket = ticket_buckets.get_mut(ticket.status);
        bucket.count += 1;
        bucket.value += ticket.total_amount;
        *ticket_ages.entry(ticket.status).or_default() += age;

        if ticket.status == TicketStatus::PendingReview && age > OVERDUE_THRESHOLD_DAYS {
            overdue.push(OverdueItem::Ticket {
                id: ticket.id,
                project_id: ticket.project_id,
                amount: ticket.total_amount,
                days: age,
            });
        }

        let sums = exposure.entry(ticket.project_id).or_default();
        match ticket.status {
            TicketStatus::Draft => sums[0] += ticket.total_amount,
            TicketStatus::PendingReview => sums[1] += ticket.total_amount,
            TicketStatus::Approved => sums[2] += ticket.total_amount,
            TicketStatus::Rejected | TicketStatus::Billed | TicketStatus::Paid => {}
        }
        sums[3] += ticket.total_amount;
    }

    for status in TicketStatus::ALL {
        let total_age = ticket_ages.get(&status).copied().unwrap_or_default();
        let bucket = ticket_buckets.get_mut(status);
        bucket.avg_age_days = mean(total_age, bucket.count);
    }

    let mut co_buckets = ChangeOrderBuckets::default();
    let mut pending_days = 0_i64;
    for co in change_orders {
        let bucket = co_buckets.get_mut(co.status);
        bucket.count += 1;
        bucket.value += co.current_amount;

        if co.status != ChangeOrderStatus::Submitted {
            continue;
        }
        let days = co
            .submitted_at
            .map_or(0, |submitted| whole_days_between(submitted, now));
        pending_days += days;
        if days > OVERDUE_THRESHOLD_DAYS {
            overdue.push(OverdueItem::ChangeOrder {
                id: co.id,
                project_id: co.project_id,
                number: co.number,
                amount: co.current_amount,
                days,
            });
        }
    }
    co_buckets.submitted_avg_days_pending = mean(pending_days, co_buckets.submitted.count);

    overdue.sort_by(|a, b| b.days().cmp(&a.days()));
    let overdue_total_value = overdue.iter().map(OverdueItem::amount).sum();

    let total_at_risk =
        ticket_buckets.draft.value
            + ticket_buckets.pending_review.value
            + co_buckets.submitted.value;
    let total_approved = ticket_buckets.approved.value + co_buckets.approved.value;

    let by_project = exposure
        .into_iter()
        .map(|(project_id, [draft, pending, approved, total])| {
            let project = projects.iter().find(|p| p.id == project_id);
            ProjectExposure {
                project_id,
                project_code: project.map(|p| p.code.clone()),
                project_name: project.map(|p| p.name.clone()),
                draft,
                pending,
                approved,
                total,
            }
        })
        .collect();

    ValueAtRiskReport {
        generated_at: now,
        tickets: ticket_buckets,
        change_orders: co_buckets,
        total_at_risk,
        total_approved,
        overdue,
        overdue_total_value,
        by_project,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(total_days: i64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_days as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{OVERDUE_THRESHOLD_DAYS, OverdueItem, value_at_risk};
    use crate::model::{
        ChangeOrder, ChangeOrderId, ChangeOrderStatus, ProjectId, Ticket, TicketId, TicketStatus,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 30, 17, 0, 0).unwrap()
    }

    fn ticket(id: i64, status: TicketStatus, amount: i64, age_days: i64) -> Ticket {
        let created = now() - Duration::days(age_days) - Duration::hours(1);
        Ticket {
            id: TicketId(id),
            project_id: ProjectId(1),
            status,
            work_date: None,
            description: None,
            location: None,
            cost_code: None,
            labor_total: Decimal::from(amount),
            materials_total: Decimal::ZERO,
            total_amount: Decimal::from(amount),
            change_order_id: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn change_order(id: i64, status: ChangeOrderStatus, amount: i64, days: i64) -> ChangeOrder {
        let submitted = now() - Duration::days(days);
        ChangeOrder {
            id: ChangeOrderId(id),
            project_id: ProjectId(1),
            number: u32::try_from(id).unwrap(),
            title: format!("CO {id}"),
            notes: None,
            status,
            original_amount: Decimal::from(amount),
            current_amount: Decimal::from(amount),
            submitted_at: (status != ChangeOrderStatus::Draft).then_some(submitted),
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            version: 1,
            created_at: submitted,
            updated_at: submitted,
        }
    }

    #[test]
    fn empty_portfolio_is_all_zero() {
        let report = value_at_risk(&[], &[], &[], now());
        assert_eq!(report.total_at_risk, Decimal::ZERO);
        assert_eq!(report.total_approved, Decimal::ZERO);
        assert!(report.overdue.is_empty());
        assert!(report.by_project.is_empty());
        assert!(report.tickets.pending_review.avg_age_days.abs() < f64::EPSILON);
    }

    #[test]
    fn mixed_portfolio_totals_and_overdue() {
        let tickets = vec![
            ticket(1, TicketStatus::Draft, 2000, 1),
            ticket(2, TicketStatus::PendingReview, 3000, 20),
            ticket(3, TicketStatus::PendingReview, 2000, 2),
        ];
        let cos = vec![change_order(1, ChangeOrderStatus::Submitted, 3000, 10)];

        let report = value_at_risk(&tickets, &cos, &[], now());
        assert_eq!(report.total_at_risk, Decimal::from(10_000));
        assert_eq!(report.tickets.pending_review.count, 2);
        assert_eq!(report.tickets.pending_review.value, Decimal::from(5000));
        assert!((report.tickets.pending_review.avg_age_days - 11.0).abs() < f64::EPSILON);
        assert!((report.change_orders.submitted_avg_days_pending - 10.0).abs() < f64::EPSILON);

        assert_eq!(report.overdue.len(), 1);
        assert!(matches!(
            report.overdue[0],
            OverdueItem::Ticket { id: TicketId(2), days: 20, .. }
        ));
        assert_eq!(report.overdue_total_value, Decimal::from(3000));
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        let tickets = vec![
            ticket(1, TicketStatus::PendingReview, 100, OVERDUE_THRESHOLD_DAYS),
            ticket(2, TicketStatus::PendingReview, 100, OVERDUE_THRESHOLD_DAYS + 1),
        ];
        let cos = vec![
            change_order(1, ChangeOrderStatus::Submitted, 500, OVERDUE_THRESHOLD_DAYS),
            change_order(2, ChangeOrderStatus::Submitted, 700, OVERDUE_THRESHOLD_DAYS + 6),
        ];

        let report = value_at_risk(&tickets, &cos, &[], now());
        assert_eq!(report.overdue.len(), 2);
        // Oldest first.
        assert!(matches!(report.overdue[0], OverdueItem::ChangeOrder { days: 20, .. }));
        assert_eq!(report.overdue_total_value, Decimal::from(800));
    }

    #[test]
    fn approved_totals_and_project_breakdown() {
        let mut other = ticket(5, TicketStatus::Paid, 400, 30);
        other.project_id = ProjectId(2);
        let tickets = vec![
            ticket(1, TicketStatus::Approved, 1000, 3),
            ticket(2, TicketStatus::Rejected, 250, 3),
            ticket(3, TicketStatus::Draft, 50, 0),
            other,
        ];
        let cos = vec![
            change_order(1, ChangeOrderStatus::Approved, 9000, 40),
            change_order(2, ChangeOrderStatus::Rejected, 1000, 40),
            change_order(3, ChangeOrderStatus::Draft, 100, 0),
        ];

        let report = value_at_risk(&tickets, &cos, &[], now());
        assert_eq!(report.total_approved, Decimal::from(10_000));
        assert_eq!(report.total_at_risk, Decimal::from(50));
        assert!(report.overdue.is_empty());
        assert_eq!(report.change_orders.rejected.value, Decimal::from(1000));
        assert_eq!(report.change_orders.draft.count, 1);

        assert_eq!(report.by_project.len(), 2);
        let p1 = &report.by_project[0];
        assert_eq!(p1.draft, Decimal::from(50));
        assert_eq!(p1.pending, Decimal::ZERO);
        assert_eq!(p1.approved, Decimal::from(1000));
        assert_eq!(p1.total, Decimal::from(1300));
        assert_eq!(report.by_project[1].total, Decimal::from(400));
    }
}
