use chrono::Utc;
use clap::Subcommand;
use diakit_core::{
    Database, HistoryEventKind, HistoryLog, HistoryMetadata, SupplyStore, TimerDraft, TimerKind,
    TimerPatch, TimerStatus,
};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Add a replacement timer
    Add {
        name: String,
        /// "cgm", "infusion-set", or "custom"
        #[arg(long)]
        kind: String,
        /// Days until replacement (defaults per kind)
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List timers with their countdown state
    List,
    /// Update fields on a timer
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// "cgm", "infusion-set", or "custom"
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a timer
    Delete { id: String },
    /// Restart a timer's countdown from now
    Reset { id: String },
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let mut store = SupplyStore::load(&db)?;
    let log = HistoryLog::new(&db);

    match action {
        TimerAction::Add {
            name,
            kind,
            days,
            notes,
        } => {
            let timer = store
                .add_timer(
                    TimerDraft {
                        name,
                        kind: kind.parse::<TimerKind>()?,
                        duration_days: days,
                        notes,
                    },
                    Utc::now(),
                )?
                .clone();
            log.log_timer_added(&timer.id, &timer.name)?;
            println!("{}", serde_json::to_string_pretty(&timer)?);
        }
        TimerAction::List => {
            let now = Utc::now();
            let rows: Vec<serde_json::Value> = store
                .timers()
                .iter()
                .map(|timer| {
                    serde_json::json!({
                        "timer": timer,
                        "status": TimerStatus::compute(timer, now),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        TimerAction::Update {
            id,
            name,
            kind,
            days,
            notes,
        } => {
            let timer = store.update_timer(
                &id,
                TimerPatch {
                    name,
                    kind: kind.as_deref().map(str::parse).transpose()?,
                    duration_days: days,
                    notes: notes.map(Some),
                },
            )?;
            log.record(
                HistoryEventKind::TimerUpdated,
                "Timer Updated",
                &format!("Updated timer {}", timer.name),
                Some(HistoryMetadata {
                    timer_id: Some(timer.id.clone()),
                    ..HistoryMetadata::default()
                }),
            )?;
            println!("{}", serde_json::to_string_pretty(&timer)?);
        }
        TimerAction::Delete { id } => {
            let removed = store.delete_timer(&id)?;
            log.record(
                HistoryEventKind::TimerDeleted,
                "Timer Deleted",
                &format!("Deleted timer {}", removed.name),
                Some(HistoryMetadata {
                    timer_id: Some(removed.id.clone()),
                    ..HistoryMetadata::default()
                }),
            )?;
            println!("{}", serde_json::to_string_pretty(&removed)?);
        }
        TimerAction::Reset { id } => {
            let timer = store.reset_timer(&id, Utc::now())?;
            log.log_timer_reset(&timer.id, &timer.name)?;
            println!("{}", serde_json::to_string_pretty(&timer)?);
        }
    }

    Ok(())
}
