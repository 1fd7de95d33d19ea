#![allow(dead_code)]

use hr_query_engine::{EngineConfig, HrAgent, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Ten employees: T1 = 1-4 (Dev), T2 = 5-7 (Dev), T3 = 8-10 (Sales)
pub fn create_hr_database(dir: &TempDir) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.path().join("hr.db");
    let conn = rusqlite::Connection::open(&path)?;

    conn.execute_batch(
        "CREATE TABLE hrdatabase_employee (
             employee_id INTEGER PRIMARY KEY,
             employee_name TEXT NOT NULL,
             employee_level TEXT,
             hire_date TEXT,
             gender TEXT
         );
         CREATE TABLE hrdatabase_teammanagement (
             team_id TEXT NOT NULL,
             employee_id INTEGER NOT NULL,
             department TEXT NOT NULL,
             team_leader_tenure INTEGER
         );
         CREATE TABLE hrdatabase_attendancemanagement (
             employee_id INTEGER PRIMARY KEY,
             total_late_days INTEGER,
             remaining_annual_leave INTEGER
         );",
    )?;

    let employees = [
        (1, "Kim Minji", "Staff", "2019-03-02", "F"),
        (2, "Lee Junho", "Manager", "2015-07-21", "M"),
        (3, "Park Seoyeon", "Staff", "2021-01-11", "F"),
        (4, "Choi Hyun", "Staff", "2022-05-30", "M"),
        (5, "Jung Yuna", "General Manager", "2010-09-01", "F"),
        (6, "Kang Doyun", "Staff", "2020-02-17", "M"),
        (7, "Yoon Jiwoo", "Staff", "2023-04-03", "F"),
        (8, "Han Siwoo", "Manager", "2016-11-08", "M"),
        (9, "Oh Chaewon", "Staff", "2018-06-25", "F"),
        (10, "Seo Jihun", "Staff", "2024-01-02", "M"),
    ];
    for (id, name, level, hired, gender) in employees {
        conn.execute(
            "INSERT INTO hrdatabase_employee VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, name, level, hired, gender],
        )?;
        let (team, department) = match id {
            1..=4 => ("T1", "Dev"),
            5..=7 => ("T2", "Dev"),
            _ => ("T3", "Sales"),
        };
        conn.execute(
            "INSERT INTO hrdatabase_teammanagement VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![team, id, department, id % 3],
        )?;
        conn.execute(
            "INSERT INTO hrdatabase_attendancemanagement VALUES (?1, ?2, ?3)",
            rusqlite::params![id, id % 4, 15 - id],
        )?;
    }

    Ok(path)
}

pub fn store(path: &PathBuf) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(path))
}

pub fn agent(path: &PathBuf) -> HrAgent {
    HrAgent::new(EngineConfig::default(), store(path))
}
