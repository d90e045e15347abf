#[path = "common/mod.rs"]
mod common;

use saccodesk::calc::{DEFAULT_PERIOD, analyse_ledger};
use saccodesk::import::ImportedContribution;
use saccodesk::models::{ContributionKind, LEDGER_ROWS, LedgerRow};
use saccodesk::state::{
    GridRow, PeriodOutcome, create_period, delete_ledger, import_grid, list_members,
    list_periods, list_report_periods, load_grid, load_ledger, load_report, resolve_period,
    save_grid, save_ledger, save_report, template_content,
};

#[tokio::test]
async fn periods_default_and_latest() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let state = ctx.state.clone();

    assert_eq!(list_periods(&state).await.unwrap(), vec![DEFAULT_PERIOD]);

    assert_eq!(
        create_period(&state, " 2024/2025 ").await.unwrap(),
        PeriodOutcome::Created("2024/2025".to_string())
    );
    assert_eq!(
        create_period(&state, "2023/2024").await.unwrap(),
        PeriodOutcome::Created("2023/2024".to_string())
    );
    assert_eq!(
        create_period(&state, "2024/2025").await.unwrap(),
        PeriodOutcome::Exists
    );
    assert_eq!(create_period(&state, "  ").await.unwrap(), PeriodOutcome::Empty);

    let (periods, selected) = resolve_period(&state, None).await.unwrap();
    assert_eq!(periods, vec!["2023/2024", "2024/2025"]);
    assert_eq!(selected, "2024/2025");
    let (_, selected) = resolve_period(&state, Some("2023/2024")).await.unwrap();
    assert_eq!(selected, "2023/2024");

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn empty_grid_offers_the_roster_and_saving_creates_members() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let state = ctx.state.clone();
    let period = "2025/2026";

    let grid = load_grid(&state, period).await.unwrap();
    assert_eq!(grid.len(), state.roster.len());
    assert!(grid.iter().all(|r| r.member_id.is_none()));

    let mut kihiu = GridRow::blank(None, "MR. KIHIU");
    kihiu.invest[0] = 1_000.0;
    kihiu.risk[1] = 50.0;
    let blank = GridRow::blank(None, "   ");
    save_grid(&state, period, vec![kihiu, blank]).await.unwrap();

    let members = list_members(&state, period).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "MR. KIHIU");

    let grid = load_grid(&state, period).await.unwrap();
    assert_eq!(grid.len(), 1);
    assert_eq!(grid[0].member_id, members[0].id);
    assert_eq!(grid[0].invest[0], 1_000.0);
    assert_eq!(grid[0].risk[1], 50.0);
    assert_eq!(grid[0].invest.len(), 12);

    let imported = vec![
        ImportedContribution {
            name: "mr. kihiu".to_string(),
            kind: ContributionKind::Risk,
            months: vec![10.0, 10.0, 10.0],
        },
        ImportedContribution {
            name: "MRS. NYORO".to_string(),
            kind: ContributionKind::Invest,
            months: vec![500.0],
        },
    ];
    assert_eq!(import_grid(&state, period, imported).await.unwrap(), 2);

    let grid = load_grid(&state, period).await.unwrap();
    assert_eq!(grid.len(), 2);
    let kihiu = grid.iter().find(|r| r.name == "MR. KIHIU").unwrap();
    assert_eq!(kihiu.invest[0], 1_000.0);
    assert_eq!(&kihiu.risk[..4], &[10.0, 10.0, 10.0, 0.0]);
    let nyoro = grid.iter().find(|r| r.name == "MRS. NYORO").unwrap();
    assert!(nyoro.member_id.is_some());
    assert_eq!(nyoro.invest[0], 500.0);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn ledger_is_padded_and_deletable() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let state = ctx.state.clone();
    let period = "2024/2025";

    let empty = load_ledger(&state, period).await.unwrap();
    assert_eq!(empty.len(), LEDGER_ROWS);
    assert!(empty.iter().all(|r| *r == LedgerRow::default()));

    let rows = vec![
        LedgerRow {
            collection_from_shares: 500.0,
            loan_given_out: 1_000.0,
            ..LedgerRow::default()
        },
        LedgerRow {
            expenses: 250.0,
            ..LedgerRow::default()
        },
    ];
    save_ledger(&state, period, rows).await.unwrap();

    let stored = load_ledger(&state, period).await.unwrap();
    assert_eq!(stored.len(), LEDGER_ROWS);
    assert_eq!(stored[0].loan_given_out, 1_000.0);
    assert_eq!(stored[1].expenses, 250.0);

    assert!(delete_ledger(&state, period).await.unwrap());
    assert!(!delete_ledger(&state, period).await.unwrap());
    assert_eq!(load_ledger(&state, period).await.unwrap()[0], LedgerRow::default());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn reports_are_saved_per_period() {
    let ctx = match common::setup_state().await {
        Some(c) => c,
        None => return,
    };
    let state = ctx.state.clone();

    assert!(load_report(&state, "2024/2025").await.unwrap().is_none());
    assert!(list_report_periods(&state).await.unwrap().is_empty());

    let seeded = template_content("MITEWA", "2024/2025", &analyse_ledger(&[]));
    assert!(seeded.contains("MITEWA Treasurer's Report for the Year 2024/2025"));

    save_report(&state, "2023/2024", "<p>old</p>").await.unwrap();
    save_report(&state, "2024/2025", &seeded).await.unwrap();
    save_report(&state, "2024/2025", "<p>edited</p>").await.unwrap();

    let report = load_report(&state, "2024/2025").await.unwrap().unwrap();
    assert_eq!(report.id, "treasurer_report_2024-2025");
    assert_eq!(report.year, "2024/2025");
    assert_eq!(report.content, "<p>edited</p>");
    assert_eq!(
        list_report_periods(&state).await.unwrap(),
        vec!["2024/2025", "2023/2024"]
    );

    common::teardown(Some(ctx)).await;
}
