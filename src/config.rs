use std::path::PathBuf;

use anyhow::Context;

use crate::calendar::REFERENCE_YEAR;
use crate::duties::DutyKind;

const DEFAULT_SHEET_ID: &str = "1METL5eBui0qkLiwJHFYsk5dUuhIU_JG_jG5FxO0SyrA";
const DEFAULT_STATE_PATH: &str = "nursery-state.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Apps Script web app URL; remote commands fail without it.
    pub script_url: Option<String>,
    pub script_token: String,
    pub sheet_id: String,
    pub memory_verses_gid: String,
    pub prayer_order_gid: String,
    pub offering_order_gid: String,
    pub cleaning_order_gid: String,
    pub state_path: PathBuf,
    pub year: i32,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Reads `NURSERY_*` variables; `main` loads `.env` beforehand.
    pub fn from_env() -> anyhow::Result<Self> {
        let year = match std::env::var("NURSERY_YEAR") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("NURSERY_YEAR must be a year, got {raw:?}"))?,
            Err(_) => REFERENCE_YEAR,
        };

        Ok(Self {
            script_url: std::env::var("NURSERY_SCRIPT_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            script_token: var_or("NURSERY_SCRIPT_TOKEN", ""),
            sheet_id: var_or("NURSERY_SHEET_ID", DEFAULT_SHEET_ID),
            memory_verses_gid: var_or("NURSERY_MEMORY_VERSES_GID", "526644461"),
            prayer_order_gid: var_or("NURSERY_PRAYER_ORDER_GID", "1349823463"),
            offering_order_gid: var_or("NURSERY_OFFERING_ORDER_GID", "1072884800"),
            cleaning_order_gid: var_or("NURSERY_CLEANING_ORDER_GID", "1639773171"),
            state_path: PathBuf::from(var_or("NURSERY_STATE", DEFAULT_STATE_PATH)),
            year,
        })
    }

    pub fn duty_gid(&self, kind: DutyKind) -> &str {
        match kind {
            DutyKind::MemoryVerses => &self.memory_verses_gid,
            DutyKind::Prayer => &self.prayer_order_gid,
            DutyKind::Offering => &self.offering_order_gid,
            DutyKind::Cleaning => &self.cleaning_order_gid,
        }
    }
}
