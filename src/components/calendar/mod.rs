//! Calendar navigation and editing on top of the event cache.

use crate::components::date_grid::{DateGrid, DayCell};
use crate::components::event_cache::{CacheState, EventCacheHandle, SelectOutcome};
use crate::components::event_remote::{Event, EventDraft, MonthKey};
use crate::error::{validation_error, CalResult, Error};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Day or event picked for editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub date: NaiveDate,
    /// `None` while composing a new event on `date`
    pub event: Option<Event>,
}

impl Selection {
    /// Form contents for the selection
    pub fn draft(&self) -> EventDraft {
        match &self.event {
            Some(event) => event.to_draft(),
            None => EventDraft::blank(self.date),
        }
    }
}

/// A grid cell together with the resident events on its day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedCell {
    pub cell: DayCell,
    pub events: Vec<Event>,
}

/// Owns the displayed month and the current selection
pub struct CalendarController {
    cache: EventCacheHandle,
    grid: DateGrid,
    today: NaiveDate,
    displayed: MonthKey,
    selection: Option<Selection>,
}

impl CalendarController {
    /// Start on the month containing `today`. Nothing is fetched until
    /// `load` or a navigation call.
    pub fn new(cache: EventCacheHandle, grid: DateGrid, today: NaiveDate) -> Self {
        Self {
            cache,
            grid,
            today,
            displayed: MonthKey::from_date(today),
            selection: None,
        }
    }

    pub fn displayed(&self) -> MonthKey {
        self.displayed
    }

    pub fn today_date(&self) -> NaiveDate {
        self.today
    }

    /// Move the notion of today, e.g. after midnight
    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
    }

    pub fn cache(&self) -> &EventCacheHandle {
        &self.cache
    }

    /// Fetch the displayed month
    pub async fn load(&mut self) -> CalResult<SelectOutcome> {
        self.show(self.displayed).await
    }

    pub async fn previous_month(&mut self) -> CalResult<SelectOutcome> {
        let key = self.displayed.previous()?;
        self.show(key).await
    }

    pub async fn next_month(&mut self) -> CalResult<SelectOutcome> {
        let key = self.displayed.next()?;
        self.show(key).await
    }

    /// Jump back to the month containing today
    pub async fn today(&mut self) -> CalResult<SelectOutcome> {
        self.show(MonthKey::from_date(self.today)).await
    }

    /// Show the month containing `date`
    pub async fn go_to_date(&mut self, date: NaiveDate) -> CalResult<SelectOutcome> {
        self.show(MonthKey::from_date(date)).await
    }

    async fn show(&mut self, key: MonthKey) -> CalResult<SelectOutcome> {
        if key != self.displayed {
            // Selection belongs to the month it was made in
            self.selection = None;
        }
        self.displayed = key;
        debug!("Displaying {}", key);
        self.cache.select_month(key).await
    }

    /// Day cells of the displayed month
    pub fn grid(&self) -> Vec<DayCell> {
        self.grid.cells(self.displayed, self.today)
    }

    pub fn weekday_labels(&self) -> Vec<String> {
        self.grid.weekday_labels()
    }

    /// Day cells annotated with the resident events of each day. Cells
    /// carry no events unless the displayed month is loaded.
    pub async fn month_view(&self) -> CalResult<Vec<AnnotatedCell>> {
        let state = self.displayed_state().await?;
        Ok(self
            .grid()
            .into_iter()
            .map(|cell| AnnotatedCell {
                cell,
                events: state.events_on(cell.date),
            })
            .collect())
    }

    /// Resident events on `date`, ordered by start time
    pub async fn events_for_day(&self, date: NaiveDate) -> CalResult<Vec<Event>> {
        Ok(self.displayed_state().await?.events_on(date))
    }

    /// Cache state, or `Empty` when it refers to another month than the one displayed
    pub async fn displayed_state(&self) -> CalResult<CacheState> {
        let state = self.cache.state().await?;
        if state.key() == Some(self.displayed) {
            Ok(state)
        } else {
            Ok(CacheState::Empty)
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Open a blank draft on `date`
    pub fn select_day(&mut self, date: NaiveDate) -> EventDraft {
        let selection = Selection { date, event: None };
        let draft = selection.draft();
        self.selection = Some(selection);
        draft
    }

    /// Open a resident event for editing
    pub async fn select_event(&mut self, id: &str) -> CalResult<EventDraft> {
        let state = self.displayed_state().await?;
        let event = state
            .events()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| Error::NotResident(id.to_string()))?;

        let selection = Selection {
            date: event.date,
            event: Some(event),
        };
        let draft = selection.draft();
        self.selection = Some(selection);
        Ok(draft)
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Save the form for the current selection: update the selected event,
    /// or create a new one. The selection closes on success and stays open
    /// on failure.
    pub async fn save(&mut self, draft: EventDraft) -> CalResult<Event> {
        let editing = self
            .selection
            .as_ref()
            .and_then(|s| s.event.as_ref())
            .map(|e| e.id.clone());

        let saved = match editing {
            Some(id) => {
                let outcome = self.cache.update(Event::from_draft(id, draft)).await?;
                if outcome.moved_out {
                    self.refetch().await;
                }
                outcome.event
            }
            None => self.cache.create(draft).await?,
        };

        info!("Saved event {} on {}", saved.id, saved.date);
        self.selection = None;
        Ok(saved)
    }

    /// Delete the selected event
    pub async fn delete_selected(&mut self) -> CalResult<()> {
        let id = self
            .selection
            .as_ref()
            .and_then(|s| s.event.as_ref())
            .map(|e| e.id.clone())
            .ok_or_else(|| validation_error("no event is selected"))?;

        self.delete_event(&id).await
    }

    /// Delete any event by id, e.g. from the all-events list
    pub async fn delete_event(&mut self, id: &str) -> CalResult<()> {
        self.cache.delete(id).await?;
        info!("Deleted event {}", id);

        let was_selected = self
            .selection
            .as_ref()
            .and_then(|s| s.event.as_ref())
            .is_some_and(|e| e.id == id);
        if was_selected {
            self.selection = None;
        }
        Ok(())
    }

    /// Every event of the user
    pub async fn all_events(&self) -> CalResult<Vec<Event>> {
        let mut events = self.cache.list_all().await?;
        events.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| crate::utils::time::compare_times(&a.time, &b.time))
        });
        Ok(events)
    }

    /// Force the displayed month to be fetched again. The mutation that
    /// triggered it already succeeded, so a failed refetch only shows up
    /// as the cache's error state.
    async fn refetch(&mut self) {
        if let Err(e) = self.cache.invalidate().await {
            warn!("Could not invalidate the event cache: {}", e);
            return;
        }
        if let Err(e) = self.cache.select_month(self.displayed).await {
            warn!("Refetching {} failed: {}", self.displayed, e);
        }
    }
}
