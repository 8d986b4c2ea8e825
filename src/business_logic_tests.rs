#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::commands::ai::{normalize_receipt, parse_data_uri, RawReceiptScan};
    use crate::commands::expenditure::{
        parse_import_rows, validate_expenditure_fields, RowError,
    };
    use crate::commands::sales::validate_sale_quantity;
    use crate::error::CluckError;
    use crate::metrics;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_mortality_rate() {
        assert_eq!(metrics::mortality_rate(100, 100), 0.0);
        assert_eq!(metrics::mortality_rate(100, 75), 25.0);
        assert_eq!(metrics::mortality_rate(0, 0), 0.0);

        // The ledger scenario: 100 birds, 20 sold, 5 lost -> 75 remain.
        // Sold birds count as losses against the initial count.
        assert_eq!(metrics::round2(metrics::mortality_rate(100, 75)), 25.00);
    }

    #[test]
    fn test_aggregate_mortality_rate() {
        assert_eq!(metrics::aggregate_mortality_rate(&[]), 0.0);
        assert_eq!(metrics::aggregate_mortality_rate(&[(0, 0)]), 0.0);
        // 300 initial, 30 lost -> 10.00%
        assert_eq!(
            metrics::aggregate_mortality_rate(&[(100, 90), (200, 180)]),
            10.00
        );
        // Not an average of per-flock rates: (10% and 50%) over 150 birds
        // with 30 lost is 20%, not 30%.
        assert_eq!(
            metrics::aggregate_mortality_rate(&[(100, 90), (50, 30)]),
            20.00
        );
    }

    #[test]
    fn test_feed_conversion_ratio() {
        // 180kg feed over 100 birds at 1.2kg -> 1.5
        let fcr = metrics::feed_conversion_ratio("Broiler", 100, 1.2, 180.0);
        assert_eq!(fcr.map(metrics::round2), Some(1.5));

        // Undefined for layers and for zero feed or zero weight gain.
        assert_eq!(metrics::feed_conversion_ratio("Layer", 100, 1.2, 180.0), None);
        assert_eq!(metrics::feed_conversion_ratio("Broiler", 100, 1.2, 0.0), None);
        assert_eq!(metrics::feed_conversion_ratio("Broiler", 0, 1.2, 180.0), None);
        assert_eq!(metrics::feed_conversion_ratio("Broiler", 100, 0.0, 180.0), None);
    }

    #[test]
    fn test_cost_per_bird() {
        assert_eq!(metrics::cost_per_bird(500.0, 100), Some(5.0));
        assert_eq!(metrics::cost_per_bird(500.0, 0), None);
    }

    #[test]
    fn test_age_in_weeks_floor() {
        let hatch = date(2025, 1, 1);
        assert_eq!(metrics::age_in_weeks(hatch, date(2025, 1, 1)), 0);
        assert_eq!(metrics::age_in_weeks(hatch, date(2025, 1, 7)), 0);
        assert_eq!(metrics::age_in_weeks(hatch, date(2025, 1, 8)), 1);
        assert_eq!(metrics::age_in_weeks(hatch, date(2025, 1, 20)), 2);
        // A hatch date in the future clamps to zero instead of going negative.
        assert_eq!(metrics::age_in_weeks(hatch, date(2024, 12, 1)), 0);
    }

    #[test]
    fn test_egg_production_rate() {
        // 2 weeks * 7 days * 50 birds = 700 bird-days; 350 eggs -> 50%
        assert_eq!(metrics::egg_production_rate(350, 2, 50), 50.0);
        assert_eq!(metrics::egg_production_rate(350, 0, 50), 0.0);
        assert_eq!(metrics::egg_production_rate(350, 2, 0), 0.0);
    }

    #[test]
    fn test_mean_defined_skips_undefined() {
        assert_eq!(
            metrics::mean_defined([Some(1.0), None, Some(3.0)]),
            Some(2.0)
        );
        assert_eq!(metrics::mean_defined([None, None]), None);
        assert_eq!(metrics::mean_defined([]), None);
    }

    #[test]
    fn test_month_keys_sort_chronologically_across_year_boundary() {
        let mut keys = vec![
            metrics::month_key(date(2025, 1, 15)),
            metrics::month_key(date(2024, 12, 3)),
            metrics::month_key(date(2025, 2, 1)),
            metrics::month_key(date(2024, 11, 30)),
        ];
        keys.sort();
        assert_eq!(keys, vec![(2024, 11), (2024, 12), (2025, 1), (2025, 2)]);
        assert_eq!(metrics::month_label(2025, 3), "2025-03");
    }

    #[test]
    fn test_sale_quantity_validation() {
        assert!(validate_sale_quantity(20, 100).is_ok());
        assert!(validate_sale_quantity(100, 100).is_ok());
        assert!(matches!(
            validate_sale_quantity(101, 100),
            Err(CluckError::Validation(_))
        ));
        assert!(matches!(
            validate_sale_quantity(0, 100),
            Err(CluckError::Validation(_))
        ));
    }

    #[test]
    fn test_expenditure_field_validation() {
        assert_eq!(
            validate_expenditure_fields("Feed", 50.0, 1.25, Some("F-1")),
            Ok(62.5)
        );
        // Labor does not require a flock.
        assert_eq!(
            validate_expenditure_fields("Labor", 2.0, 10.0, None),
            Ok(20.0)
        );

        let (field, _) = validate_expenditure_fields("Feed", 50.0, 1.25, None).unwrap_err();
        assert_eq!(field, "flockId");

        let (field, _) = validate_expenditure_fields("Feed", 0.0, 1.25, Some("F-1")).unwrap_err();
        assert_eq!(field, "quantity");

        let (field, _) = validate_expenditure_fields("Feed", 5.0, 0.0, Some("F-1")).unwrap_err();
        assert_eq!(field, "unitPrice");

        let (field, _) = validate_expenditure_fields("Snacks", 5.0, 1.0, None).unwrap_err();
        assert_eq!(field, "category");
    }

    #[test]
    fn test_csv_import_mixed_rows() {
        let csv = "category,quantity,unitPrice,description,expenditureDate,flockId\n\
                   Feed,50,1.25,Starter feed,2025-06-01,F-AAAA0001\n\
                   Labor,10,15,Weekend help,2025-06-02,\n\
                   Feed,25,2.0,Grower feed,2025-06-03,\n\
                   Medicine,abc,5,Vaccines,2025-06-04,F-AAAA0001\n\
                   Other,0,5,Zero quantity,2025-06-05,\n";

        let (valid, errors) = parse_import_rows(csv);

        assert_eq!(valid.len(), 2);
        assert_eq!(errors.len(), 3);

        let (row1, first) = &valid[0];
        assert_eq!(*row1, 1);
        assert_eq!(first.amount, 62.5);
        assert_eq!(first.flock_id.as_deref(), Some("F-AAAA0001"));
        let (row2, second) = &valid[1];
        assert_eq!(*row2, 2);
        assert_eq!(second.flock_id, None);

        // Feed without a flock.
        assert_eq!(errors[0].row, 3);
        assert_eq!(errors[0].field, "flockId");
        // Non-numeric quantity fails typed deserialization.
        assert_eq!(errors[1].row, 4);
        assert_eq!(errors[1].field, "quantity");
        // Zero quantity fails the business rule.
        assert_eq!(errors[2].row, 5);
        assert_eq!(errors[2].field, "quantity");
    }

    #[test]
    fn test_csv_import_bad_date() {
        let csv = "category,quantity,unitPrice,description,expenditureDate,flockId\n\
                   Labor,1,10,Help,June 1st,\n";
        let (valid, errors) = parse_import_rows(csv);
        assert!(valid.is_empty());
        assert_eq!(
            errors[0],
            RowError {
                row: 1,
                field: "expenditureDate".into(),
                message: "Invalid date 'June 1st'".into(),
            }
        );
    }

    #[test]
    fn test_receipt_normalization() {
        // Only a total: quantity defaults to 1, unit price back-computed.
        let draft = normalize_receipt(
            RawReceiptScan {
                category: Some("Feed".into()),
                quantity: None,
                unit_price: None,
                amount: Some(120.0),
                description: Some("Feed store".into()),
                expenditure_date: Some("2025-06-01".into()),
            },
            date(2025, 6, 15),
        )
        .unwrap();
        assert_eq!(draft.quantity, 1.0);
        assert_eq!(draft.unit_price, 120.0);
        assert_eq!(draft.amount, 120.0);
        assert_eq!(draft.expenditure_date, date(2025, 6, 1));

        // Unknown category falls back to Other; missing date to today.
        let draft = normalize_receipt(
            RawReceiptScan {
                category: Some("Groceries".into()),
                quantity: Some(4.0),
                unit_price: None,
                amount: Some(100.0),
                description: None,
                expenditure_date: None,
            },
            date(2025, 6, 15),
        )
        .unwrap();
        assert_eq!(draft.category, "Other");
        assert_eq!(draft.unit_price, 25.0);
        assert_eq!(draft.expenditure_date, date(2025, 6, 15));

        // No amount is an upstream contract violation.
        let err = normalize_receipt(
            RawReceiptScan {
                category: None,
                quantity: None,
                unit_price: None,
                amount: None,
                description: None,
                expenditure_date: None,
            },
            date(2025, 6, 15),
        );
        assert!(matches!(err, Err(CluckError::Upstream(_))));
    }

    #[test]
    fn test_parse_data_uri() {
        let (mime, payload) = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(payload, "aGVsbG8=");

        assert!(parse_data_uri("not a data uri").is_err());
        assert!(parse_data_uri("data:image/png;base64,!!!").is_err());
    }
}
