use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::career::{MIN_OPPONENT_MATCHES, OpponentRecord, PlayerReport};
use crate::corpus::MatchRecord;

const OPPONENT_LIST_LEN: usize = 5;

pub struct ExportReport {
    pub years: usize,
    pub surfaces: usize,
    pub recent_matches: usize,
    pub opponents: usize,
}

pub fn export_player_report(path: &Path, report: &PlayerReport) -> Result<ExportReport> {
    let s = &report.summary;
    let summary_rows = vec![
        vec!["Field".to_string(), "Value".to_string()],
        vec!["Player".to_string(), s.player.clone()],
        vec!["Total Matches".to_string(), s.matches.to_string()],
        vec!["Total Wins".to_string(), s.wins.to_string()],
        vec!["Total Losses".to_string(), s.losses.to_string()],
        vec!["Overall Winrate (%)".to_string(), format!("{:.2}", s.winrate_pct)],
    ];

    let mut year_rows = vec![vec![
        "Year".to_string(),
        "Matches".to_string(),
        "Wins".to_string(),
        "Winrate (%)".to_string(),
    ]];
    for y in &report.by_year {
        year_rows.push(vec![
            y.year.to_string(),
            y.matches.to_string(),
            y.wins.to_string(),
            format!("{:.2}", y.winrate_pct),
        ]);
    }

    let total_surface_wins: u32 = report.by_surface.iter().map(|s| s.wins).sum();
    let mut surface_rows = vec![vec![
        "Surface".to_string(),
        "Wins".to_string(),
        "Share (%)".to_string(),
    ]];
    for sw in &report.by_surface {
        let share = if total_surface_wins == 0 {
            0.0
        } else {
            f64::from(sw.wins) / f64::from(total_surface_wins) * 100.0
        };
        surface_rows.push(vec![
            sw.surface.clone(),
            sw.wins.to_string(),
            format!("{share:.1}"),
        ]);
    }

    let mut recent_rows = vec![vec![
        "Date".to_string(),
        "Tournament".to_string(),
        "Surface".to_string(),
        "Winner".to_string(),
        "Loser".to_string(),
        "Score".to_string(),
    ]];
    recent_rows.extend(report.recent_matches.iter().map(recent_row));

    let mut opponent_rows = vec![vec![
        "List".to_string(),
        "Opponent".to_string(),
        "Matches".to_string(),
        "Wins".to_string(),
        "Winrate (%)".to_string(),
    ]];
    let lists = [
        ("Most Played", report.opponents.most_played(OPPONENT_LIST_LEN)),
        (
            "Toughest",
            report
                .opponents
                .toughest(OPPONENT_LIST_LEN, MIN_OPPONENT_MATCHES),
        ),
        (
            "Easiest",
            report
                .opponents
                .easiest(OPPONENT_LIST_LEN, MIN_OPPONENT_MATCHES),
        ),
        ("All", report.opponents.records.clone()),
    ];
    for (label, records) in &lists {
        opponent_rows.extend(records.iter().map(|r| opponent_row(label, r)));
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("By Year")?;
        write_rows(sheet, &year_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("By Surface")?;
        write_rows(sheet, &surface_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Recent Matches")?;
        write_rows(sheet, &recent_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Opponents")?;
        write_rows(sheet, &opponent_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        years: year_rows.len().saturating_sub(1),
        surfaces: surface_rows.len().saturating_sub(1),
        recent_matches: recent_rows.len().saturating_sub(1),
        opponents: report.opponents.records.len(),
    })
}

fn recent_row(m: &MatchRecord) -> Vec<String> {
    vec![
        m.date.to_string(),
        m.tournament.clone(),
        opt_to_string(m.surface.as_deref()),
        m.winner.name.clone(),
        m.loser.name.clone(),
        opt_to_string(m.score.as_deref()),
    ]
}

fn opponent_row(label: &str, r: &OpponentRecord) -> Vec<String> {
    vec![
        label.to_string(),
        r.opponent.clone(),
        r.matches.to_string(),
        r.wins.to_string(),
        format!("{:.2}", r.winrate_pct),
    ]
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
