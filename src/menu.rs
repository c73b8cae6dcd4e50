// src/menu.rs

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};
use crate::transport::Transport;

/// Speeds offered by default, slow group first.
pub const DEFAULT_SPEEDS: [f64; 9] = [0.1, 0.25, 0.5, 0.75, 1.0, 2.0, 3.0, 4.0, 5.0];

/// Geometry of the popup, in surface coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MenuLayout {
    pub width: i32,
    pub row_height: i32,
}

impl Default for MenuLayout {
    fn default() -> Self {
        Self {
            width: 120,
            row_height: 28,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuEntry {
    Header(&'static str),
    Separator,
    Speed(f64),
    Loop,
}

impl MenuEntry {
    pub fn label(&self) -> String {
        match self {
            MenuEntry::Header(text) => (*text).to_string(),
            MenuEntry::Separator => String::new(),
            MenuEntry::Speed(rate) => format!("{rate}×"),
            MenuEntry::Loop => "Loop".to_string(),
        }
    }

    pub fn is_selectable(&self) -> bool {
        matches!(self, MenuEntry::Speed(_) | MenuEntry::Loop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuState {
    Closed,
    Open { anchor_x: i32, anchor_y: i32 },
}

/// One laid-out line of the open menu.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuRow {
    pub entry: MenuEntry,
    pub active: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Right-click popup with the speed choices and the loop toggle.
///
/// The active speed and the loop marker are always derived from the transport
/// (see [`SpeedMenu::sync`]), never tracked independently.
#[derive(Debug, Clone)]
pub struct SpeedMenu {
    state: MenuState,
    layout: MenuLayout,
    entries: Vec<MenuEntry>,
    active_rate: Option<f64>,
    loop_active: bool,
}

impl SpeedMenu {
    pub fn new(speeds: &[f64], layout: MenuLayout) -> Self {
        let mut unique: Vec<f64> = Vec::new();
        for &rate in speeds {
            if rate.is_finite() && rate > 0.0 && !unique.contains(&rate) {
                unique.push(rate);
            }
        }
        let (slow, fast): (Vec<f64>, Vec<f64>) = unique.into_iter().partition(|r| *r < 1.0);

        let mut entries = vec![MenuEntry::Header("Playback Speed"), MenuEntry::Separator];
        entries.extend(slow.iter().copied().map(MenuEntry::Speed));
        if !slow.is_empty() && !fast.is_empty() {
            entries.push(MenuEntry::Separator);
        }
        entries.extend(fast.iter().copied().map(MenuEntry::Speed));
        entries.extend([
            MenuEntry::Separator,
            MenuEntry::Header("Other"),
            MenuEntry::Separator,
            MenuEntry::Loop,
        ]);

        Self {
            state: MenuState::Closed,
            layout,
            entries,
            active_rate: None,
            loop_active: false,
        }
    }

    /// First bind to a transport: markers start from its current rate and loop flag.
    pub fn bind(&mut self, transport: &dyn Transport) {
        self.state = MenuState::Closed;
        self.sync(transport);
    }

    /// Re-derives both markers from the transport. Call after anything that may
    /// have changed the rate or the loop flag.
    pub fn sync(&mut self, transport: &dyn Transport) {
        let rate = transport.playback_rate();
        self.active_rate = self
            .entries
            .iter()
            .any(|e| *e == MenuEntry::Speed(rate))
            .then_some(rate);
        self.loop_active = transport.looping();
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, MenuState::Open { .. })
    }

    pub fn open(&mut self, x: i32, y: i32) {
        self.state = MenuState::Open {
            anchor_x: x,
            anchor_y: y,
        };
    }

    pub fn close(&mut self) {
        self.state = MenuState::Closed;
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn active_rate(&self) -> Option<f64> {
        self.active_rate
    }

    pub fn loop_active(&self) -> bool {
        self.loop_active
    }

    pub fn is_active(&self, entry: &MenuEntry) -> bool {
        match entry {
            MenuEntry::Speed(rate) => self.active_rate == Some(*rate),
            MenuEntry::Loop => self.loop_active,
            _ => false,
        }
    }

    /// Applies a speed. Only valid while open; closes the menu afterwards.
    /// Returns `Ok(false)` when the menu was closed and nothing happened.
    pub fn select_rate(&mut self, rate: f64, transport: &dyn Transport) -> Result<bool> {
        if !self.is_open() {
            return Ok(false);
        }
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PlayerError::InvalidArgument(format!(
                "playback rate must be positive, got {rate}"
            )));
        }
        transport.set_playback_rate(rate);
        self.sync(transport);
        self.close();
        log::debug!("⏩ Playback rate {rate}×");
        Ok(true)
    }

    /// Flips looping. The menu stays open.
    pub fn toggle_loop(&mut self, transport: &dyn Transport) -> bool {
        if !self.is_open() {
            return false;
        }
        transport.set_looping(!transport.looping());
        self.sync(transport);
        log::debug!("🔁 Loop {}", if self.loop_active { "on" } else { "off" });
        true
    }

    /// Rows of the open menu, top to bottom. Empty while closed.
    pub fn rows(&self) -> Vec<MenuRow> {
        let MenuState::Open { anchor_x, anchor_y } = self.state else {
            return Vec::new();
        };
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| MenuRow {
                entry: *entry,
                active: self.is_active(entry),
                x: anchor_x,
                y: anchor_y.saturating_add((i as i32).saturating_mul(self.layout.row_height)),
                width: self.layout.width,
                height: self.layout.row_height,
            })
            .collect()
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        let MenuState::Open { anchor_x, anchor_y } = self.state else {
            return false;
        };
        let height = (self.entries.len() as i32).saturating_mul(self.layout.row_height);
        x >= anchor_x as f64
            && x < anchor_x.saturating_add(self.layout.width) as f64
            && y >= anchor_y as f64
            && y < anchor_y.saturating_add(height) as f64
    }

    /// Entry under a point, if the menu is open and the point is inside it.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<MenuEntry> {
        if !self.contains(x, y) {
            return None;
        }
        let MenuState::Open { anchor_y, .. } = self.state else {
            return None;
        };
        let row = ((y - anchor_y as f64) / self.layout.row_height.max(1) as f64).floor() as usize;
        self.entries.get(row).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ClockTransport;

    fn menu() -> SpeedMenu {
        SpeedMenu::new(&DEFAULT_SPEEDS, MenuLayout { width: 10, row_height: 1 })
    }

    fn active_speeds(menu: &SpeedMenu) -> Vec<f64> {
        menu.entries()
            .iter()
            .filter_map(|e| match e {
                MenuEntry::Speed(r) if menu.is_active(e) => Some(*r),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_layout_matches_groups() {
        let labels: Vec<String> = menu().entries().iter().map(MenuEntry::label).collect();
        assert_eq!(
            labels,
            vec![
                "Playback Speed", "", "0.1×", "0.25×", "0.5×", "0.75×", "", "1×", "2×", "3×",
                "4×", "5×", "", "Other", "", "Loop",
            ]
        );
    }

    #[test]
    fn test_bind_marks_default_rate() {
        let transport = ClockTransport::new();
        let mut menu = menu();
        menu.bind(&transport);
        assert_eq!(active_speeds(&menu), vec![1.0]);
        assert!(!menu.loop_active());
        assert!(!menu.is_open());
    }

    #[test]
    fn test_speed_selection_keeps_one_active_entry() {
        let transport = ClockTransport::new();
        let mut menu = menu();
        menu.bind(&transport);

        for rate in [2.0, 0.25, 5.0, 0.25, 1.0, 0.75] {
            menu.open(3, 4);
            assert!(menu.select_rate(rate, &transport).unwrap());
            assert!(!menu.is_open());
            assert_eq!(active_speeds(&menu), vec![transport.playback_rate()]);
            assert_eq!(transport.playback_rate(), rate);
        }
    }

    #[test]
    fn test_selection_while_closed_is_ignored() {
        let transport = ClockTransport::new();
        let mut menu = menu();
        menu.bind(&transport);
        assert!(!menu.select_rate(3.0, &transport).unwrap());
        assert!(!menu.toggle_loop(&transport));
        assert_eq!(transport.playback_rate(), 1.0);
        assert!(!transport.looping());
    }

    #[test]
    fn test_invalid_rate_is_rejected() {
        let transport = ClockTransport::new();
        let mut menu = menu();
        menu.bind(&transport);
        menu.open(0, 0);
        let err = menu.select_rate(-1.0, &transport).unwrap_err();
        assert!(matches!(err, PlayerError::InvalidArgument(_)));
        assert!(menu.is_open());
        assert_eq!(active_speeds(&menu), vec![1.0]);
    }

    #[test]
    fn test_loop_toggle_mirrors_transport_and_stays_open() {
        let transport = ClockTransport::new();
        let mut menu = menu();
        menu.bind(&transport);
        menu.open(0, 0);

        for _ in 0..3 {
            assert!(menu.toggle_loop(&transport));
            assert!(menu.is_open());
            assert_eq!(menu.loop_active(), transport.looping());
            assert_eq!(menu.is_active(&MenuEntry::Loop), transport.looping());
        }
        assert!(transport.looping());
    }

    #[test]
    fn test_sync_follows_rate_changed_elsewhere() {
        let transport = ClockTransport::new();
        let mut menu = menu();
        menu.bind(&transport);

        transport.set_playback_rate(3.0);
        menu.sync(&transport);
        assert_eq!(active_speeds(&menu), vec![3.0]);

        // A rate that is not on the menu leaves no entry marked.
        transport.set_playback_rate(1.5);
        menu.sync(&transport);
        assert!(active_speeds(&menu).is_empty());
    }

    #[test]
    fn test_hit_test_and_rows() {
        let mut menu = menu();
        assert_eq!(menu.hit_test(0.0, 0.0), None);
        assert!(menu.rows().is_empty());

        menu.open(5, 2);
        assert_eq!(menu.hit_test(5.0, 2.0), Some(MenuEntry::Header("Playback Speed")));
        assert_eq!(menu.hit_test(14.9, 4.5), Some(MenuEntry::Speed(0.1)));
        assert_eq!(menu.hit_test(6.0, 17.0), Some(MenuEntry::Loop));
        assert_eq!(menu.hit_test(15.0, 4.0), None);
        assert_eq!(menu.hit_test(6.0, 18.0), None);
        assert!(!menu.contains(4.0, 3.0));

        let rows = menu.rows();
        assert_eq!(rows.len(), menu.entries().len());
        assert_eq!((rows[2].x, rows[2].y), (5, 4));
    }

    #[test]
    fn test_far_anchor_saturates_instead_of_overflowing() {
        let mut menu = SpeedMenu::new(&DEFAULT_SPEEDS, MenuLayout { width: 120, row_height: 28 });
        menu.open(i32::MAX - 5, i32::MAX - 3);

        let rows = menu.rows();
        assert_eq!(rows.len(), menu.entries().len());
        assert_eq!(rows.last().unwrap().y, i32::MAX);
        assert!(menu.contains((i32::MAX - 5) as f64, (i32::MAX - 3) as f64));
        assert_eq!(
            menu.hit_test((i32::MAX - 5) as f64, (i32::MAX - 3) as f64),
            Some(MenuEntry::Header("Playback Speed"))
        );
    }

    #[test]
    fn test_reopen_moves_anchor() {
        let mut menu = menu();
        menu.open(1, 1);
        menu.open(7, 9);
        assert_eq!(menu.state(), MenuState::Open { anchor_x: 7, anchor_y: 9 });
        menu.close();
        assert_eq!(menu.state(), MenuState::Closed);
    }
}
