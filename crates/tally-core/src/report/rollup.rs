use crate::model::money::percent_of;
use crate::model::{ChangeOrder, Project, ProjectId};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Change order totals for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRollup {
    pub project_id: ProjectId,
    pub project_code: Option<String>,
    pub project_name: Option<String>,
    pub change_orders: usize,
    pub total_original: Decimal,
    pub total_current: Decimal,
    pub total_variance: Decimal,
    /// Two decimal places; zero when nothing has been submitted.
    pub variance_percent: Decimal,
}

/// Roll change orders up per project, ordered by project id.
///
/// Projects without change orders are omitted. Change orders whose project
/// is missing from `projects` still roll up, without a code or name.
#[must_use]
pub fn rollup_by_project(
    change_orders: &[ChangeOrder],
    projects: &[Project],
) -> Vec<ProjectRollup> {
    let mut sums: BTreeMap<ProjectId, (usize, Decimal, Decimal)> = BTreeMap::new();
    for co in change_orders {
        let entry = sums.entry(co.project_id).or_default();
        entry.0 += 1;
        entry.1 += co.original_amount;
        entry.2 += co.current_amount;
    }

    sums.into_iter()
        .map(|(project_id, (count, original, current))| {
            let project = projects.iter().find(|p| p.id == project_id);
            let variance = current - original;
            ProjectRollup {
                project_id,
                project_code: project.map(|p| p.code.clone()),
                project_name: project.map(|p| p.name.clone()),
                change_orders: count,
                total_original: original,
                total_current: current,
                total_variance: variance,
                variance_percent: percent_of(variance, original, 2).unwrap_or(Decimal::ZERO),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::rollup_by_project;
    use crate::model::{ChangeOrder, ChangeOrderId, ChangeOrderStatus, Project, ProjectId};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn co(id: i64, project: i64, original: i64, current: i64) -> ChangeOrder {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        ChangeOrder {
            id: ChangeOrderId(id),
            project_id: ProjectId(project),
            number: 1,
            title: format!("CO {id}"),
            notes: None,
            status: ChangeOrderStatus::Submitted,
            original_amount: Decimal::from(original),
            current_amount: Decimal::from(current),
            submitted_at: Some(at),
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            rejected_by: None,
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn sums_per_project() {
        let projects = vec![Project {
            id: ProjectId(1),
            code: "P1".to_string(),
            name: "Clinic fit-out".to_string(),
            budget: Decimal::from(100_000),
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }];
        let cos = vec![co(1, 1, 1000, 1200), co(2, 1, 2000, 2000), co(3, 2, 0, 500)];

        let rollups = rollup_by_project(&cos, &projects);
        assert_eq!(rollups.len(), 2);

        let p1 = &rollups[0];
        assert_eq!(p1.project_code.as_deref(), Some("P1"));
        assert_eq!(p1.change_orders, 2);
        assert_eq!(p1.total_original, Decimal::from(3000));
        assert_eq!(p1.total_current, Decimal::from(3200));
        assert_eq!(p1.total_variance, Decimal::from(200));
        assert_eq!(p1.variance_percent, Decimal::new(667, 2));

        let p2 = &rollups[1];
        assert!(p2.project_code.is_none());
        assert_eq!(p2.variance_percent, Decimal::ZERO);
    }

    #[test]
    fn empty_input_has_no_rows() {
        assert!(rollup_by_project(&[], &[]).is_empty());
    }
}
