#[cfg(test)]
mod tests {
    use axum::extract::{Extension, Json, Query, State};
    use chrono::NaiveDate;

    use crate::commands::expenditure::{
        create_expenditure, delete_expenditure, DeleteExpenditureInput, ExpenditureInput,
    };
    use crate::commands::flock::{
        create_flock, record_loss, CreateFlockInput, RecordLossInput,
    };
    use crate::commands::sales::{
        create_sale, delete_sale, update_sale, CreateSaleInput, DeleteSaleInput, UpdateSaleInput,
    };
    use crate::db::{self, Flock};
    use crate::error::CluckError;
    use crate::metrics;
    use crate::middleware::auth::Claims;
    use crate::state::AppState;

    async fn setup_test_state() -> AppState {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = db::init_pool(&database_url)
            .await
            .expect("Failed to create pool");
        db::init_database(&pool)
            .await
            .expect("Failed to run migrations");
        AppState { pool }
    }

    async fn create_test_user(state: &AppState) -> Claims {
        let email = format!("it-{}@cluckhub.test", uuid::Uuid::new_v4());
        let (user_id,): (i32,) = sqlx::query_as(
            "INSERT INTO users (email, password_hash) VALUES ($1, 'x') RETURNING id",
        )
        .bind(&email)
        .fetch_one(&state.pool)
        .await
        .unwrap();
        Claims {
            sub: email.clone(),
            user_id,
            email,
            exp: usize::MAX,
        }
    }

    async fn cleanup_test_user(state: &AppState, claims: &Claims) {
        for table in ["sales", "expenditures", "flocks", "sensor_readings"] {
            let _ = sqlx::query(&format!("DELETE FROM {} WHERE owner_id = $1", table))
                .bind(claims.user_id)
                .execute(&state.pool)
                .await;
        }
        let _ = sqlx::query("DELETE FROM user_profiles WHERE owner_id = $1")
            .bind(claims.user_id)
            .execute(&state.pool)
            .await;
        let _ = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(claims.user_id)
            .execute(&state.pool)
            .await;
    }

    async fn create_test_flock(state: &AppState, claims: &Claims, initial: i32) -> Flock {
        create_flock(
            State(state.clone()),
            Extension(claims.clone()),
            Json(CreateFlockInput {
                breed: "Ross 308".to_string(),
                flock_type: "Broiler".to_string(),
                initial_count: initial,
                hatch_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                average_weight: Some(0.1),
            }),
        )
        .await
        .expect("create_flock failed")
        .0
    }

    async fn fetch_flock(state: &AppState, flock_id: &str) -> Flock {
        sqlx::query_as("SELECT * FROM flocks WHERE flock_id = $1")
            .bind(flock_id)
            .fetch_one(&state.pool)
            .await
            .expect("flock not found")
    }

    #[tokio::test]
    async fn test_end_to_end_ledger_flow() {
        let state = setup_test_state().await;
        let claims = create_test_user(&state).await;

        let flock = create_test_flock(&state, &claims, 100).await;
        assert_eq!(flock.bird_count, 100);
        assert_eq!(flock.initial_count, 100);

        // Feed expenditure: 50 units at 1.00.
        create_expenditure(
            State(state.clone()),
            Extension(claims.clone()),
            Json(ExpenditureInput {
                category: "Feed".to_string(),
                quantity: 50.0,
                unit_price: 1.0,
                description: Some("Starter feed".to_string()),
                expenditure_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                flock_id: Some(flock.flock_id.clone()),
            }),
        )
        .await
        .expect("create_expenditure failed");

        let after_feed = fetch_flock(&state, &flock.flock_id).await;
        assert_eq!(after_feed.total_feed_consumed, 50.0);
        assert_eq!(after_feed.total_cost, 50.0);

        // Sale of 20 birds at 10.00 each.
        let sale = create_sale(
            State(state.clone()),
            Extension(claims.clone()),
            Json(CreateSaleInput {
                flock_id: flock.flock_id.clone(),
                quantity: 20,
                price_per_unit: 10.0,
                customer: Some("Market stall".to_string()),
                sale_date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            }),
        )
        .await
        .expect("create_sale failed")
        .0;
        assert_eq!(sale.total_amount, 200.0);

        let after_sale = fetch_flock(&state, &flock.flock_id).await;
        assert_eq!(after_sale.bird_count, 80);

        // Loss of 5 birds.
        record_loss(
            State(state.clone()),
            Extension(claims.clone()),
            Json(RecordLossInput {
                flock_id: flock.flock_id.clone(),
                count: 5,
            }),
        )
        .await
        .expect("record_loss failed");

        let after_loss = fetch_flock(&state, &flock.flock_id).await;
        assert_eq!(after_loss.bird_count, 75);
        assert_eq!(
            metrics::round2(metrics::mortality_rate(
                after_loss.initial_count,
                after_loss.bird_count
            )),
            25.00
        );

        cleanup_test_user(&state, &claims).await;
    }

    #[tokio::test]
    async fn test_sale_record_then_delete_round_trip() {
        let state = setup_test_state().await;
        let claims = create_test_user(&state).await;
        let flock = create_test_flock(&state, &claims, 60).await;

        let sale = create_sale(
            State(state.clone()),
            Extension(claims.clone()),
            Json(CreateSaleInput {
                flock_id: flock.flock_id.clone(),
                quantity: 15,
                price_per_unit: 8.0,
                customer: None,
                sale_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(fetch_flock(&state, &flock.flock_id).await.bird_count, 45);

        delete_sale(
            State(state.clone()),
            Extension(claims.clone()),
            Json(DeleteSaleInput {
                sale_id: sale.sale_id.clone(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(fetch_flock(&state, &flock.flock_id).await.bird_count, 60);

        let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sales WHERE sale_id = $1")
            .bind(&sale.sale_id)
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert_eq!(remaining.0, 0);

        cleanup_test_user(&state, &claims).await;
    }

    #[tokio::test]
    async fn test_sale_insufficient_birds_rejected() {
        let state = setup_test_state().await;
        let claims = create_test_user(&state).await;
        let flock = create_test_flock(&state, &claims, 10).await;

        let result = create_sale(
            State(state.clone()),
            Extension(claims.clone()),
            Json(CreateSaleInput {
                flock_id: flock.flock_id.clone(),
                quantity: 11,
                price_per_unit: 5.0,
                customer: None,
                sale_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            }),
        )
        .await;

        assert!(matches!(result, Err(CluckError::Validation(_))));
        // Nothing was written.
        assert_eq!(fetch_flock(&state, &flock.flock_id).await.bird_count, 10);
        let sales: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sales WHERE owner_id = $1")
            .bind(claims.user_id)
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert_eq!(sales.0, 0);

        cleanup_test_user(&state, &claims).await;
    }

    #[tokio::test]
    async fn test_expenditure_record_then_delete_round_trip() {
        let state = setup_test_state().await;
        let claims = create_test_user(&state).await;
        let flock = create_test_flock(&state, &claims, 40).await;

        let expenditure = create_expenditure(
            State(state.clone()),
            Extension(claims.clone()),
            Json(ExpenditureInput {
                category: "Feed".to_string(),
                quantity: 30.0,
                unit_price: 2.5,
                description: None,
                expenditure_date: NaiveDate::from_ymd_opt(2025, 7, 5).unwrap(),
                flock_id: Some(flock.flock_id.clone()),
            }),
        )
        .await
        .unwrap()
        .0;

        let charged = fetch_flock(&state, &flock.flock_id).await;
        assert_eq!(charged.total_cost, 75.0);
        assert_eq!(charged.total_feed_consumed, 30.0);

        delete_expenditure(
            State(state.clone()),
            Extension(claims.clone()),
            Json(DeleteExpenditureInput {
                expenditure_id: expenditure.expenditure_id.clone(),
            }),
        )
        .await
        .unwrap();

        let restored = fetch_flock(&state, &flock.flock_id).await;
        assert_eq!(restored.total_cost, 0.0);
        assert_eq!(restored.total_feed_consumed, 0.0);

        cleanup_test_user(&state, &claims).await;
    }

    #[tokio::test]
    async fn test_sale_flock_move_reconciles_both_flocks() {
        let state = setup_test_state().await;
        let claims = create_test_user(&state).await;
        let flock_a = create_test_flock(&state, &claims, 50).await;
        let flock_b = create_test_flock(&state, &claims, 50).await;

        let sale = create_sale(
            State(state.clone()),
            Extension(claims.clone()),
            Json(CreateSaleInput {
                flock_id: flock_a.flock_id.clone(),
                quantity: 10,
                price_per_unit: 6.0,
                customer: None,
                sale_date: NaiveDate::from_ymd_opt(2025, 7, 10).unwrap(),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(fetch_flock(&state, &flock_a.flock_id).await.bird_count, 40);

        update_sale(
            State(state.clone()),
            Extension(claims.clone()),
            Json(UpdateSaleInput {
                sale_id: sale.sale_id.clone(),
                flock_id: flock_b.flock_id.clone(),
                quantity: 10,
                price_per_unit: 6.0,
                customer: None,
                sale_date: NaiveDate::from_ymd_opt(2025, 7, 10).unwrap(),
            }),
        )
        .await
        .unwrap();

        let moved_from = fetch_flock(&state, &flock_a.flock_id).await;
        let moved_to = fetch_flock(&state, &flock_b.flock_id).await;
        assert_eq!(moved_from.bird_count, 50);
        assert_eq!(moved_to.bird_count, 40);
        // The original flock's other aggregates are untouched.
        assert_eq!(moved_from.total_cost, 0.0);
        assert_eq!(moved_from.total_feed_consumed, 0.0);

        cleanup_test_user(&state, &claims).await;
    }

    #[tokio::test]
    async fn test_csv_import_creates_only_valid_rows() {
        let state = setup_test_state().await;
        let claims = create_test_user(&state).await;
        let flock = create_test_flock(&state, &claims, 30).await;

        let csv = format!(
            "category,quantity,unitPrice,description,expenditureDate,flockId\n\
             Feed,20,1.5,Feed bags,2025-07-01,{}\n\
             Labor,4,12,Cleaning,2025-07-02,\n\
             Feed,10,2.0,No flock given,2025-07-03,\n",
            flock.flock_id
        );

        let report = crate::commands::expenditure::import_expenditures(
            State(state.clone()),
            Extension(claims.clone()),
            csv,
        )
        .await
        .unwrap()
        .0;

        assert_eq!(report.total_rows, 3);
        assert_eq!(report.imported, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 3);

        let created: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM expenditures WHERE owner_id = $1")
                .bind(claims.user_id)
                .fetch_one(&state.pool)
                .await
                .unwrap();
        assert_eq!(created.0, 2);

        // The valid Feed row was booked against the flock.
        let charged = fetch_flock(&state, &flock.flock_id).await;
        assert_eq!(charged.total_feed_consumed, 20.0);
        assert_eq!(charged.total_cost, 30.0);

        cleanup_test_user(&state, &claims).await;
    }

    #[tokio::test]
    async fn test_get_sales_scoped_to_owner() {
        let state = setup_test_state().await;
        let claims_a = create_test_user(&state).await;
        let claims_b = create_test_user(&state).await;
        let flock = create_test_flock(&state, &claims_a, 20).await;

        create_sale(
            State(state.clone()),
            Extension(claims_a.clone()),
            Json(CreateSaleInput {
                flock_id: flock.flock_id.clone(),
                quantity: 5,
                price_per_unit: 4.0,
                customer: None,
                sale_date: NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(),
            }),
        )
        .await
        .unwrap();

        let other_view = crate::commands::sales::get_sales(
            State(state.clone()),
            Extension(claims_b.clone()),
            Query(crate::commands::sales::SalesQuery { flock_id: None }),
        )
        .await
        .unwrap()
        .0;
        assert!(other_view.is_empty());

        cleanup_test_user(&state, &claims_a).await;
        cleanup_test_user(&state, &claims_b).await;
    }
}
