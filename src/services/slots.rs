use std::collections::BTreeMap;
use std::iter::Peekable;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use serde::Serialize;

use super::ReservationError;
use crate::db::queries;
use crate::models::span::{normalize, subtract_intervals};
use crate::models::{
    AvailabilityOverride, AvailabilityWindow, BlackoutDate, Resource, ScheduleScope, Span,
    TimeWindow,
};

pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// A bookable candidate interval on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub resource_id: String,
    pub requires_approval: bool,
}

/// Schedule inputs for one resource over a date range.
#[derive(Debug, Clone, Default)]
pub struct ResourceSchedule {
    pub resource_id: String,
    pub business_id: String,
    pub windows: Vec<AvailabilityWindow>,
    pub overrides: Vec<AvailabilityOverride>,
    pub blackouts: Vec<BlackoutDate>,
    /// Time already taken by live reservations and unexpired holds.
    pub occupied: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq)]
struct DayPlan {
    /// Opening windows for the date, merged. Slot starts are stepped from
    /// the start of each window.
    windows: Vec<Span>,
    /// Windows minus slot-removing blackouts.
    open: Vec<Span>,
    /// `open` minus occupied time.
    free: Vec<Span>,
    /// Request-only blackout periods.
    approval: Vec<Span>,
}

impl DayPlan {
    fn build(schedule: &ResourceSchedule, date: NaiveDate) -> Self {
        let windows = normalize(
            opening_windows(schedule, date)
                .iter()
                .map(|w| w.on(date))
                .collect(),
        );

        let blocked = normalize(
            schedule
                .blackouts
                .iter()
                .filter(|b| b.kind.removes_slots())
                .map(BlackoutDate::span)
                .collect(),
        );
        let approval = normalize(
            schedule
                .blackouts
                .iter()
                .filter(|b| !b.kind.removes_slots())
                .map(BlackoutDate::span)
                .collect(),
        );
        let occupied = normalize(schedule.occupied.clone());

        let open = subtract_intervals(&windows, &blocked);
        let free = subtract_intervals(&open, &occupied);

        Self {
            windows,
            open,
            free,
            approval,
        }
    }

    fn needs_approval(&self, span: &Span) -> bool {
        self.approval.iter().any(|a| a.overlaps(span))
    }
}

/// The windows open on `date`: the override when one exists, otherwise the
/// recurring template for that weekday.
fn opening_windows(schedule: &ResourceSchedule, date: NaiveDate) -> Vec<TimeWindow> {
    if let Some(ov) = schedule.overrides.iter().find(|o| o.date == date) {
        return ov.open_windows().to_vec();
    }
    schedule
        .windows
        .iter()
        .filter(|w| w.weekday == date.weekday())
        .map(|w| w.window)
        .collect()
}

#[derive(Debug, Clone)]
struct ResourcePlan {
    resource_id: String,
    days: Vec<DayPlan>,
}

/// Precomputed free time for one or more resources. Slots are produced
/// lazily by [`SlotPlan::slots`], which can be called any number of times.
#[derive(Debug, Clone)]
pub struct SlotPlan {
    from: NaiveDate,
    to: NaiveDate,
    resources: Vec<ResourcePlan>,
    duration: Duration,
    step: Duration,
    not_before: Option<NaiveDateTime>,
}

impl SlotPlan {
    pub fn slots(&self) -> Slots<'_> {
        Slots {
            heads: self
                .resources
                .iter()
                .map(|plan| {
                    ResourceSlots {
                        plan,
                        duration: self.duration,
                        step: self.step,
                        not_before: self.not_before,
                        day: 0,
                        window: 0,
                        cursor: None,
                    }
                    .peekable()
                })
                .collect(),
        }
    }

    /// Whether each date in the range has at least one slot.
    pub fn day_availability(&self) -> BTreeMap<NaiveDate, bool> {
        let mut days: BTreeMap<NaiveDate, bool> =
            self.from.iter_days().take_while(|d| *d <= self.to).map(|d| (d, false)).collect();
        for slot in self.slots() {
            days.insert(slot.start.date(), true);
        }
        days
    }
}

struct ResourceSlots<'a> {
    plan: &'a ResourcePlan,
    duration: Duration,
    step: Duration,
    not_before: Option<NaiveDateTime>,
    day: usize,
    window: usize,
    cursor: Option<NaiveDateTime>,
}

impl<'a> Iterator for ResourceSlots<'a> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            let day = self.plan.days.get(self.day)?;
            let Some(window) = day.windows.get(self.window) else {
                self.day += 1;
                self.window = 0;
                self.cursor = None;
                continue;
            };

            let start = self.cursor.unwrap_or(window.start);
            let candidate = Span::new(start, start + self.duration);
            if candidate.end > window.end {
                self.window += 1;
                self.cursor = None;
                continue;
            }
            self.cursor = Some(start + self.step);

            if self.not_before.is_some_and(|nb| start < nb) {
                continue;
            }
            if day.free.iter().any(|f| f.contains_span(&candidate)) {
                return Some(Slot {
                    start: candidate.start,
                    end: candidate.end,
                    resource_id: self.plan.resource_id.clone(),
                    requires_approval: day.needs_approval(&candidate),
                });
            }
        }
    }
}

/// Chronological merge of the per-resource slot streams. Ties are broken by
/// resource id.
pub struct Slots<'a> {
    heads: Vec<Peekable<ResourceSlots<'a>>>,
}

impl<'a> Iterator for Slots<'a> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let mut best: Option<(usize, NaiveDateTime, String)> = None;
        for (i, head) in self.heads.iter_mut().enumerate() {
            if let Some(slot) = head.peek() {
                let better = match &best {
                    None => true,
                    Some((_, start, rid)) => (slot.start, &slot.resource_id) < (*start, rid),
                };
                if better {
                    best = Some((i, slot.start, slot.resource_id.clone()));
                }
            }
        }
        let (i, _, _) = best?;
        self.heads[i].next()
    }
}

/// Computes free slots of `duration_minutes` for each schedule over the
/// inclusive date range. Pure: everything it reads is in `schedules`.
pub fn compute_available_slots(
    schedules: &[ResourceSchedule],
    from: NaiveDate,
    to: NaiveDate,
    duration_minutes: i64,
    step_minutes: Option<i64>,
    not_before: Option<NaiveDateTime>,
) -> SlotPlan {
    let resources = schedules
        .iter()
        .map(|schedule| ResourcePlan {
            resource_id: schedule.resource_id.clone(),
            days: from
                .iter_days()
                .take_while(|d| *d <= to)
                .map(|date| DayPlan::build(schedule, date))
                .collect(),
        })
        .collect();

    SlotPlan {
        from,
        to,
        resources,
        duration: Duration::minutes(duration_minutes),
        step: Duration::minutes(step_minutes.unwrap_or(duration_minutes)),
        not_before,
    }
}

// ── Store access ──

/// What to compute slots for. A bookable type alone expands to every active
/// resource linked to it; a resource with a type falls back to the type's
/// schedule when the resource has none of its own.
#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub resource_id: Option<String>,
    pub bookable_type_id: Option<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: i64,
    pub step_minutes: Option<i64>,
}

impl SlotQuery {
    pub fn validate(&self, max_days: i64) -> Result<(), ReservationError> {
        if self.resource_id.is_none() && self.bookable_type_id.is_none() {
            return Err(ReservationError::Validation(
                "either resource_id or bookable_type_id is required".to_string(),
            ));
        }
        if !(1..=MAX_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(ReservationError::Validation(format!(
                "duration_minutes must be between 1 and {MAX_DURATION_MINUTES}"
            )));
        }
        if let Some(step) = self.step_minutes {
            if !(1..=MAX_DURATION_MINUTES).contains(&step) {
                return Err(ReservationError::Validation(format!(
                    "step_minutes must be between 1 and {MAX_DURATION_MINUTES}"
                )));
            }
        }
        if self.to < self.from {
            return Err(ReservationError::Validation(
                "'to' must not be before 'from'".to_string(),
            ));
        }
        if (self.to - self.from).num_days() + 1 > max_days {
            return Err(ReservationError::Validation(format!(
                "date range may cover at most {max_days} days"
            )));
        }
        Ok(())
    }
}

fn day_span(from: NaiveDate, to: NaiveDate) -> Span {
    let end = to.succ_opt().unwrap_or(to);
    Span::new(from.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
}

/// Reads everything the calculator needs for one resource. Holds and
/// reservations named in `exclude_hold`/`exclude_booking` do not count as
/// occupied.
#[allow(clippy::too_many_arguments)]
pub fn load_schedule(
    conn: &Connection,
    resource: &Resource,
    bookable_type_id: Option<&str>,
    from: NaiveDate,
    to: NaiveDate,
    now: &NaiveDateTime,
    exclude_hold: Option<&str>,
    exclude_booking: Option<&str>,
) -> rusqlite::Result<ResourceSchedule> {
    let mut windows = queries::windows_for(conn, ScheduleScope::Resource, &resource.id)?;
    if windows.is_empty() {
        if let Some(type_id) = bookable_type_id {
            windows = queries::windows_for(conn, ScheduleScope::BookableType, type_id)?;
        }
    }

    let mut overrides =
        queries::overrides_in_range(conn, ScheduleScope::Resource, &resource.id, from, to)?;
    if let Some(type_id) = bookable_type_id {
        for ov in queries::overrides_in_range(conn, ScheduleScope::BookableType, type_id, from, to)? {
            if !overrides.iter().any(|o| o.date == ov.date) {
                overrides.push(ov);
            }
        }
    }

    let range = day_span(from, to);
    let blackouts = queries::blackouts_overlapping(conn, &resource.business_id, &resource.id, &range)?;

    let mut occupied: Vec<Span> =
        queries::live_reservations_overlapping(conn, &resource.id, &range, exclude_booking)?
            .into_iter()
            .map(|(_, span)| span)
            .collect();
    occupied.extend(
        queries::live_holds_overlapping(conn, &resource.id, &range, now, exclude_hold)?
            .iter()
            .map(|h| h.span()),
    );

    Ok(ResourceSchedule {
        resource_id: resource.id.clone(),
        business_id: resource.business_id.clone(),
        windows,
        overrides,
        blackouts,
        occupied,
    })
}

/// Resolves the query to resources, loads their schedules and returns the
/// slot plan. Slots starting before `now` are left out.
pub fn plan_slots(
    conn: &Connection,
    query: &SlotQuery,
    now: &NaiveDateTime,
    max_days: i64,
) -> Result<SlotPlan, ReservationError> {
    query.validate(max_days)?;

    let type_id = query.bookable_type_id.as_deref();
    if let Some(type_id) = type_id {
        if queries::get_bookable_type(conn, type_id)?.is_none() {
            return Err(ReservationError::NotFound(format!("bookable type {type_id}")));
        }
    }

    let resources = match &query.resource_id {
        Some(resource_id) => {
            let resource = queries::get_resource(conn, resource_id)?
                .ok_or_else(|| ReservationError::NotFound(format!("resource {resource_id}")))?;
            if resource.is_active {
                vec![resource]
            } else {
                vec![]
            }
        }
        None => match type_id {
            Some(type_id) => queries::resources_for_type(conn, type_id)?,
            None => vec![],
        },
    };

    let schedules = resources
        .iter()
        .map(|r| load_schedule(conn, r, type_id, query.from, query.to, now, None, None))
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(compute_available_slots(
        &schedules,
        query.from,
        query.to,
        query.duration_minutes,
        query.step_minutes,
        Some(*now),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCheck {
    pub requires_approval: bool,
}

/// Confirms that exactly `span` can still be booked on the resource under the
/// same rules the calculator uses. Grid alignment is not required.
pub fn check_slot_open(
    conn: &Connection,
    resource: &Resource,
    bookable_type_id: Option<&str>,
    span: &Span,
    now: &NaiveDateTime,
    exclude_hold: Option<&str>,
    exclude_booking: Option<&str>,
) -> Result<SlotCheck, ReservationError> {
    if span.is_empty() {
        return Err(ReservationError::Validation("slot must end after it starts".to_string()));
    }
    if span.start < *now {
        return Err(ReservationError::SlotUnavailable("slot is in the past".to_string()));
    }
    let date = span.start.date();
    let last_instant = span.end - Duration::seconds(1);
    if last_instant.date() != date {
        return Err(ReservationError::SlotUnavailable(
            "slot must fall within a single day".to_string(),
        ));
    }

    let schedule = load_schedule(
        conn,
        resource,
        bookable_type_id,
        date,
        date,
        now,
        exclude_hold,
        exclude_booking,
    )?;
    let day = DayPlan::build(&schedule, date);

    if !day.windows.iter().any(|w| w.contains_span(span)) {
        return Err(ReservationError::SlotUnavailable(
            "outside opening hours".to_string(),
        ));
    }
    if !day.open.iter().any(|w| w.contains_span(span)) {
        return Err(ReservationError::SlotUnavailable("blacked out".to_string()));
    }
    if !day.free.iter().any(|w| w.contains_span(span)) {
        return Err(ReservationError::SlotUnavailable(
            "already booked or held".to_string(),
        ));
    }

    Ok(SlotCheck {
        requires_approval: day.needs_approval(span),
    })
}
