//! Grouping, best-marking and row projection.
//!
//! Assignments are bucketed by the bus trip they connect to. Groups are shown
//! in departure order with the no-connection group last, and every usable group
//! except the chronologically last one is flagged as a recommended choice.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::connect::{Assignment, GroupKey};
use super::merge::BusTrip;
use super::window::TimeWindow;
use crate::domain::Endpoint;

/// All upstream arrivals connecting to the same bus (or to no bus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub key: GroupKey,
    /// The bus trip behind `key`; `None` for the no-connection group.
    pub bus: Option<BusTrip>,
    /// Assignments sorted by upstream origin.
    pub items: Vec<Assignment>,
    pub best: bool,
    /// Layover shown for a bus with no connecting upstream arrival.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesized_layover_mins: Option<i64>,
}

impl Group {
    /// A group is usable if it names a real trip and has a connection.
    pub fn is_eligible(&self) -> bool {
        self.key.is_trip() && !self.items.is_empty()
    }
}

/// Layover displayed for a bus nobody can reach from upstream.
///
/// Never exceeds the buffer and never goes negative.
fn synthesized_layover(bus: &BusTrip, window: &TimeWindow, buffer_mins: i64) -> i64 {
    window
        .start
        .minutes_until(bus.departure.time)
        .min(buffer_mins)
        .max(0)
}

/// Bucket assignments by bus and add empty groups for unreachable buses.
///
/// A bus with no assignment still gets a group when its departure or its
/// terminal arrival falls inside the window. Groups come back sorted by key
/// with best flags already set.
pub fn group_assignments(
    assignments: Vec<Assignment>,
    buses: &[BusTrip],
    window: &TimeWindow,
    buffer_mins: i64,
) -> Vec<Group> {
    let by_key: HashMap<GroupKey, &BusTrip> =
        buses.iter().map(|bus| (GroupKey::for_bus(bus), bus)).collect();

    let mut buckets: BTreeMap<GroupKey, Vec<Assignment>> = BTreeMap::new();
    for assignment in assignments {
        buckets.entry(assignment.bus.clone()).or_default().push(assignment);
    }

    let mut groups: BTreeMap<GroupKey, Group> = buckets
        .into_iter()
        .map(|(key, mut items)| {
            items.sort_by(|a, b| {
                a.upstream
                    .from_time()
                    .cmp(&b.upstream.from_time())
                    .then_with(|| a.upstream.trip_id().cmp(b.upstream.trip_id()))
            });
            let bus = by_key.get(&key).map(|bus| (*bus).clone());
            let group = Group {
                key: key.clone(),
                bus,
                items,
                best: false,
                synthesized_layover_mins: None,
            };
            (key, group)
        })
        .collect();

    for bus in buses {
        let key = GroupKey::for_bus(bus);
        if groups.contains_key(&key) {
            continue;
        }
        let visible = window.contains(bus.departure.time) || window.contains(bus.terminal_arrival().time);
        if !visible {
            continue;
        }
        groups.insert(
            key.clone(),
            Group {
                key,
                bus: Some(bus.clone()),
                items: Vec::new(),
                best: false,
                synthesized_layover_mins: Some(synthesized_layover(bus, window, buffer_mins)),
            },
        );
    }

    let mut groups: Vec<Group> = groups.into_values().collect();
    mark_best(&mut groups);
    groups
}

/// Flag every eligible group except the last one as best.
pub fn mark_best(groups: &mut [Group]) {
    let last_eligible = groups.iter().rposition(Group::is_eligible);
    for (idx, group) in groups.iter_mut().enumerate() {
        group.best = group.is_eligible() && Some(idx) != last_eligible;
    }
}

/// One display cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    pub predicted: bool,
    /// Timetabled value, shown alongside a prediction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_text: Option<String>,
}

impl Cell {
    /// An empty cell.
    pub fn blank() -> Self {
        Self {
            text: String::new(),
            predicted: false,
            scheduled_text: None,
        }
    }

    /// A cell showing an arrival or departure time.
    pub fn time(endpoint: &Endpoint) -> Self {
        Self {
            text: endpoint.time.to_string(),
            predicted: endpoint.predicted,
            scheduled_text: endpoint
                .scheduled
                .filter(|_| endpoint.predicted)
                .map(|t| t.to_string()),
        }
    }

    /// A cell showing a layover in minutes.
    pub fn minutes(mins: i64) -> Self {
        Self {
            text: format!("{mins} min"),
            predicted: false,
            scheduled_text: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// One display row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRow {
    /// Feeder arrival at the upstream origin.
    pub feeder: Cell,
    /// Upstream arrival at the bus stop area.
    pub upstream: Cell,
    pub layover: Cell,
    /// Bus arrival at the alighting stop.
    pub terminal: Cell,
    /// Bus arrival at home, when the extension leg is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<Cell>,
}

fn feeder_cell(assignment: &Assignment) -> Cell {
    assignment
        .feeder
        .as_ref()
        .map_or_else(Cell::blank, |f| Cell::time(f.to()))
}

fn terminal_cells(bus: Option<&BusTrip>, include_home: bool) -> (Cell, Option<Cell>) {
    let terminal = bus.map_or_else(Cell::blank, |b| Cell::time(&b.arrival));
    let home = include_home.then(|| {
        bus.and_then(|b| b.home.as_ref())
            .map_or_else(Cell::blank, Cell::time)
    });
    (terminal, home)
}

/// One row per assignment.
///
/// The terminal and home arrivals appear only on the last row, since they
/// belong to the bus trip rather than to any single connection. A group with
/// no assignments renders one row with the synthesized layover.
pub fn expanded_rows(group: &Group, include_home: bool) -> Vec<PlanRow> {
    let (terminal, home) = terminal_cells(group.bus.as_ref(), include_home);

    if group.items.is_empty() {
        return vec![PlanRow {
            feeder: Cell::blank(),
            upstream: Cell::blank(),
            layover: group
                .synthesized_layover_mins
                .map_or_else(Cell::blank, Cell::minutes),
            terminal,
            home,
        }];
    }

    let last = group.items.len() - 1;
    group
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let (terminal, home) = if idx == last {
                (terminal.clone(), home.clone())
            } else {
                (Cell::blank(), include_home.then(Cell::blank))
            };
            PlanRow {
                feeder: feeder_cell(item),
                upstream: Cell::time(item.upstream.to()),
                layover: item.wait_mins.map_or_else(Cell::blank, Cell::minutes),
                terminal,
                home,
            }
        })
        .collect()
}

/// The single row shown for a collapsed group.
///
/// This is the last expanded row. If its feeder cell is blank, the most recent
/// earlier item with a feeder fills it in.
pub fn collapsed_row(group: &Group, include_home: bool) -> Option<PlanRow> {
    let mut row = expanded_rows(group, include_home).pop()?;
    if row.feeder.is_blank() {
        if let Some(cell) = group
            .items
            .iter()
            .rev()
            .find(|item| item.feeder.is_some())
            .map(feeder_cell)
        {
            row.feeder = cell;
        }
    }
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LegPair, TransitTime, TripId};
    use chrono::Duration;

    fn at(hhmm: &str) -> TransitTime {
        TransitTime::parse_iso(&format!("2024-03-15T{hhmm}:00-04:00")).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(at("17:00"), Duration::hours(3)).unwrap()
    }

    fn bus(trip: &str, dep: &str, arr: &str) -> BusTrip {
        BusTrip {
            trip_id: TripId::from(trip),
            departure: Endpoint::scheduled(at(dep)),
            arrival: Endpoint::scheduled(at(arr)),
            home: None,
        }
    }

    fn assignment(up: (&str, &str), feeder: Option<(&str, &str)>, bus: Option<&BusTrip>) -> Assignment {
        let upstream = LegPair::scheduled(TripId::new(format!("u{}", up.0)), at(up.0), at(up.1)).unwrap();
        let feeder = feeder.map(|(f, t)| LegPair::scheduled(TripId::new(format!("m{f}")), at(f), at(t)).unwrap());
        let (key, wait) = match bus {
            Some(b) => (GroupKey::for_bus(b), Some(upstream.to_time().minutes_until(b.departure.time))),
            None => (GroupKey::NoConnection, None),
        };
        Assignment {
            upstream,
            feeder,
            bus: key,
            wait_mins: wait,
        }
    }

    #[test]
    fn groups_sorted_with_none_last() {
        let b1 = bus("b1", "17:30", "17:50");
        let b2 = bus("b2", "17:45", "18:05");
        let assignments = vec![
            assignment(("17:40", "17:55"), None, None),
            assignment(("17:20", "17:35"), None, Some(&b2)),
            assignment(("17:05", "17:20"), None, Some(&b1)),
        ];

        let groups = group_assignments(assignments, &[b1.clone(), b2.clone()], &window(), 3);
        let keys: Vec<GroupKey> = groups.iter().map(|g| g.key.clone()).collect();
        assert_eq!(keys, vec![GroupKey::for_bus(&b1), GroupKey::for_bus(&b2), GroupKey::NoConnection]);
        assert_eq!(groups[0].bus.as_ref(), Some(&b1));
        assert!(groups[2].bus.is_none());
    }

    #[test]
    fn items_sorted_within_group() {
        let b1 = bus("b1", "17:40", "18:00");
        let assignments = vec![
            assignment(("17:15", "17:30"), None, Some(&b1)),
            assignment(("17:05", "17:20"), None, Some(&b1)),
        ];
        let groups = group_assignments(assignments, &[b1], &window(), 3);
        assert_eq!(groups[0].items[0].upstream.from_time(), at("17:05"));
        assert_eq!(groups[0].items[1].upstream.from_time(), at("17:15"));
    }

    #[test]
    fn last_eligible_group_not_best() {
        let b1 = bus("b1", "17:30", "17:50");
        let b2 = bus("b2", "17:45", "18:05");
        let b3 = bus("b3", "18:00", "18:20");
        let assignments = vec![
            assignment(("17:05", "17:20"), None, Some(&b1)),
            assignment(("17:20", "17:35"), None, Some(&b2)),
            assignment(("17:50", "18:05"), None, None),
        ];

        let groups = group_assignments(assignments, &[b1, b2, b3], &window(), 3);
        let best: Vec<bool> = groups.iter().map(|g| g.best).collect();
        // b1, b2, b3 (empty), none
        assert_eq!(best, vec![true, false, false, false]);
    }

    #[test]
    fn single_eligible_group_not_best() {
        let b1 = bus("b1", "17:30", "17:50");
        let groups = group_assignments(
            vec![assignment(("17:05", "17:20"), None, Some(&b1))],
            &[b1],
            &window(),
            3,
        );
        assert!(!groups[0].best);
    }

    #[test]
    fn empty_bus_group_has_synthesized_layover() {
        let soon = bus("soon", "17:02", "17:20");
        let later = bus("later", "18:30", "18:50");
        let gone = bus("gone", "16:10", "16:30");

        let groups = group_assignments(Vec::new(), &[gone, soon, later], &window(), 3);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].synthesized_layover_mins, Some(2));
        assert_eq!(groups[1].synthesized_layover_mins, Some(3));
        assert!(groups.iter().all(|g| !g.best && g.items.is_empty()));
    }

    #[test]
    fn bus_departed_before_window_shown_if_arrival_inside() {
        let running = bus("running", "16:50", "17:10");
        let groups = group_assignments(Vec::new(), &[running], &window(), 3);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].synthesized_layover_mins, Some(0));
    }

    #[test]
    fn expanded_rows_put_terminal_on_last() {
        let b1 = bus("b1", "17:40", "18:00");
        let assignments = vec![
            assignment(("17:05", "17:20"), Some(("16:50", "17:02")), Some(&b1)),
            assignment(("17:15", "17:30"), None, Some(&b1)),
        ];
        let groups = group_assignments(assignments, &[b1], &window(), 3);
        let rows = expanded_rows(&groups[0], false);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].feeder.text, "17:02");
        assert_eq!(rows[0].upstream.text, "17:20");
        assert_eq!(rows[0].layover.text, "20 min");
        assert!(rows[0].terminal.is_blank());
        assert_eq!(rows[1].terminal.text, "18:00");
        assert!(rows[1].home.is_none());
    }

    #[test]
    fn home_cells_when_enabled() {
        let mut b1 = bus("b1", "17:40", "18:00");
        b1.home = Some(Endpoint::scheduled(at("18:07")));
        let assignments = vec![
            assignment(("17:05", "17:20"), None, Some(&b1)),
            assignment(("17:15", "17:30"), None, Some(&b1)),
        ];
        let groups = group_assignments(assignments, &[b1], &window(), 3);
        let rows = expanded_rows(&groups[0], true);

        assert_eq!(rows[0].home.as_ref().map(Cell::is_blank), Some(true));
        assert_eq!(rows[1].home.as_ref().map(|c| c.text.as_str()), Some("18:07"));
    }

    #[test]
    fn collapsed_row_backfills_feeder() {
        let b1 = bus("b1", "17:40", "18:00");
        let assignments = vec![
            assignment(("17:05", "17:20"), Some(("16:50", "17:02")), Some(&b1)),
            assignment(("17:15", "17:30"), None, Some(&b1)),
        ];
        let groups = group_assignments(assignments, &[b1], &window(), 3);
        let row = collapsed_row(&groups[0], false).unwrap();

        assert_eq!(row.feeder.text, "17:02");
        assert_eq!(row.upstream.text, "17:30");
        assert_eq!(row.terminal.text, "18:00");
    }

    #[test]
    fn predicted_cell_carries_schedule() {
        let endpoint = Endpoint::predicted(at("17:14"), Some(at("17:10")));
        let cell = Cell::time(&endpoint);
        assert!(cell.predicted);
        assert_eq!(cell.scheduled_text.as_deref(), Some("17:10"));

        let cell = Cell::time(&Endpoint::scheduled(at("17:10")));
        assert_eq!(cell.scheduled_text, None);
    }
}
