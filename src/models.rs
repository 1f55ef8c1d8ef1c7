//! Data types shared by the fetch, legacy and stitching stages
//!
//! Covers the known-teams input (`teams.json`), the manifest that maps team
//! numbers to pixel offsets (`avatars.json`), and the pending set of teams
//! that still lack an avatar during a run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Team number as used by the events API and the map client.
pub type TeamNumber = u32;

/// A team from `teams.json`.
///
/// The file also carries `lat`/`lng` for the map client; only the number
/// matters here.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Team {
    pub team_number: TeamNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Top-left pixel offset of an avatar in a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Loc {
    pub x: u32,
    pub y: u32,
}

impl Loc {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Team number to location entries, kept in insertion order.
///
/// Serialized as a JSON object keyed by the team number. Reading keeps the
/// order the entries were stored in, so a legacy manifest is walked the same
/// way on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Locations {
    entries: IndexMap<TeamNumber, Loc>,
}

impl Locations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the location for `team`.
    ///
    /// A replaced entry keeps its original position.
    pub fn insert(&mut self, team: TeamNumber, loc: Loc) {
        self.entries.insert(team, loc);
    }

    pub fn get(&self, team: TeamNumber) -> Option<Loc> {
        self.entries.get(&team).copied()
    }

    pub fn contains(&self, team: TeamNumber) -> bool {
        self.entries.contains_key(&team)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TeamNumber, Loc)> + '_ {
        self.entries.iter().map(|(team, loc)| (*team, *loc))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(TeamNumber, Loc)> for Locations {
    fn from_iter<I: IntoIterator<Item = (TeamNumber, Loc)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// Contents of `avatars.json`: grid size plus every team's location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Manifest {
    /// Cells per row and per column
    pub sheet_size: u32,
    pub locations: Locations,
}

impl Manifest {
    pub fn new(sheet_size: u32) -> Self {
        Self { sheet_size, locations: Locations::new() }
    }
}

/// Teams that still need an avatar.
///
/// Created from the known teams and only ever shrinks: each producer stage
/// takes the teams it found an avatar for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSet {
    teams: HashSet<TeamNumber>,
}

impl PendingSet {
    pub fn from_teams(teams: &[Team]) -> Self {
        teams.iter().map(|t| t.team_number).collect()
    }

    pub fn contains(&self, team: TeamNumber) -> bool {
        self.teams.contains(&team)
    }

    /// Remove `team`, returning whether it was still pending.
    pub fn take(&mut self, team: TeamNumber) -> bool {
        self.teams.remove(&team)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

impl FromIterator<TeamNumber> for PendingSet {
    fn from_iter<I: IntoIterator<Item = TeamNumber>>(iter: I) -> Self {
        Self { teams: iter.into_iter().collect() }
    }
}
