// src/view_tests.rs

#[cfg(test)]
mod tests {
    use crate::aggregator::AttendanceAggregator;
    use crate::formatter::HolidayCalendar;
    use crate::test_support::*;
    use crate::view::*;
    use chrono::{FixedOffset, NaiveDate};
    use std::sync::Arc;

    fn view_over<D: crate::hr_client::UserDirectory + 'static>(
        directory: Arc<D>,
    ) -> Arc<AttendanceView<D>> {
        Arc::new(AttendanceView::new(
            directory,
            AttendanceAggregator::new(HolidayCalendar::default(), FixedOffset::east_opt(0).unwrap()),
        ))
    }

    fn ctx(id: i64) -> CompanyContext {
        CompanyContext::new(company(id, &format!("Company {}", id)))
    }

    #[tokio::test]
    async fn reload_applies_result() {
        let directory = Arc::new(StaticDirectory::new(vec![user(1, "A", "B", Vec::new())]));
        let view = view_over(directory.clone());

        let outcome = view
            .reload(&ctx(1), Period::new(Some(2024), Some(0)))
            .await
            .unwrap();

        assert_eq!(outcome, ReloadOutcome::Applied { generation: 1, users: 1 });
        assert_eq!(view.users().await.len(), 1);
        assert_eq!(view.applied_generation().await, 1);
        assert_eq!(directory.calls(), vec![(1, Some(2024), Some(0))]);
    }

    #[tokio::test]
    async fn stale_response_does_not_overwrite_newer_one() {
        let directory = Arc::new(GatedDirectory::default());
        let first_gate = directory.gate(1).await;
        let second_gate = directory.gate(2).await;
        let view = view_over(directory.clone());

        // Generations are taken when reload() is called, not when it is polled
        let first = tokio::spawn({
            let view = view.clone();
            async move { view.reload(&ctx(1), Period::default()).await }
        });
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let view = view.clone();
            async move { view.reload(&ctx(2), Period::default()).await }
        });
        tokio::task::yield_now().await;

        // The newer request answers first
        second_gate
            .send(vec![user(2, "New", "Result", Vec::new())])
            .unwrap();
        let second_outcome = second.await.unwrap().unwrap();
        assert!(matches!(second_outcome, ReloadOutcome::Applied { users: 1, .. }));

        first_gate
            .send(vec![
                user(1, "Old", "Result", Vec::new()),
                user(3, "Old", "Other", Vec::new()),
            ])
            .unwrap();
        let first_outcome = first.await.unwrap().unwrap();
        assert!(matches!(first_outcome, ReloadOutcome::Superseded { .. }));

        let users = view.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].full_name, "New Result");
    }

    #[tokio::test]
    async fn closing_scope_aborts_pending_reload() {
        let directory = Arc::new(GatedDirectory::default());
        let gate = directory.gate(1).await;
        let view = view_over(directory.clone());

        let mut scope = ViewScope::new();
        view.spawn_reload(&mut scope, &ctx(1), Period::default());
        tokio::task::yield_now().await;
        assert_eq!(scope.pending(), 1);

        scope.close();
        assert_eq!(scope.pending(), 0);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        // The aborted task dropped its receiver
        let _ = gate.send(vec![user(1, "Late", "Response", Vec::new())]);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(view.users().await.is_empty());
        assert_eq!(view.applied_generation().await, 0);
    }

    #[tokio::test]
    async fn dropping_scope_aborts_pending_reload() {
        let directory = Arc::new(GatedDirectory::default());
        let gate = directory.gate(1).await;
        let view = view_over(directory.clone());

        {
            let mut scope = ViewScope::new();
            view.spawn_reload(&mut scope, &ctx(1), Period::default());
            tokio::task::yield_now().await;
        }
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        let _ = gate.send(vec![user(1, "Late", "Response", Vec::new())]);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(view.users().await.is_empty());
    }

    #[tokio::test]
    async fn scope_join_all_waits_for_completion() {
        let directory = Arc::new(StaticDirectory::new(vec![user(1, "A", "B", Vec::new())]));
        let view = view_over(directory);

        let mut scope = ViewScope::new();
        view.spawn_reload(&mut scope, &ctx(1), Period::default());
        scope.join_all().await;

        assert_eq!(view.users().await.len(), 1);
        assert_eq!(scope.pending(), 0);
    }

    #[test]
    fn month_options_current_and_previous() {
        let options = month_options(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].name, "March");
        assert_eq!(options[0].code, 2);
        assert_eq!(options[1].name, "February");
        assert_eq!(options[1].code, 1);
        assert_eq!(options[1].year, 2024);
    }

    #[test]
    fn month_options_wrap_to_previous_december() {
        let options = month_options(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(options[0].code, 0);
        assert_eq!(options[1].name, "December");
        assert_eq!(options[1].code, 11);
        assert_eq!(options[1].year, 2023);
    }

    #[test]
    fn period_containing_date_is_zero_based() {
        let period = Period::containing(NaiveDate::from_ymd_opt(2024, 10, 17).unwrap());
        assert_eq!(period, Period::new(Some(2024), Some(9)));
    }
}
