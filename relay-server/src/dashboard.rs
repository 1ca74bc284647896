//! Terminal dashboard for the relay server

use crate::config::RelayConfig;
use crate::metrics::{LogLevel, Metrics, ServerStatus};
use crate::server::{self, BoxError, ServerEvent};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::RwLock;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame, Terminal,
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Position in the activity log
struct DashboardState {
    /// Entries hidden below the viewport (0 = newest visible)
    log_scroll: usize,
    /// Stick to the newest entry as logs arrive
    follow: bool,
}

impl DashboardState {
    fn new() -> Self {
        Self {
            log_scroll: 0,
            follow: true,
        }
    }

    /// Move towards older entries
    fn scroll_back(&mut self, lines: usize, log_count: usize) {
        if log_count == 0 {
            return;
        }
        self.log_scroll = (self.log_scroll + lines).min(log_count - 1);
        self.follow = false;
    }

    /// Move towards newer entries; reaching the bottom resumes following
    fn scroll_forward(&mut self, lines: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(lines);
        if self.log_scroll == 0 {
            self.follow = true;
        }
    }

    fn jump_to_oldest(&mut self, log_count: usize) {
        self.scroll_back(log_count, log_count);
    }

    fn jump_to_newest(&mut self) {
        self.log_scroll = 0;
        self.follow = true;
    }

    fn toggle_follow(&mut self) {
        self.follow = !self.follow;
        if self.follow {
            self.log_scroll = 0;
        }
    }

    /// Apply a key press. Returns true when the dashboard should exit.
    fn handle_key(&mut self, key: KeyEvent, log_count: usize) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Up | KeyCode::Char('k') => self.scroll_back(1, log_count),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_forward(1),
            KeyCode::PageUp => self.scroll_back(PAGE, log_count),
            KeyCode::PageDown => self.scroll_forward(PAGE),
            KeyCode::Home => self.jump_to_oldest(log_count),
            KeyCode::End => self.jump_to_newest(),
            KeyCode::Char('a') => self.toggle_follow(),
            _ => {}
        }
        false
    }
}

const PAGE: usize = 10;

/// Run the dashboard
pub async fn run(config: RelayConfig, metrics: Arc<RwLock<Metrics>>) -> Result<(), BoxError> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Channel for server events
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Start the HTTP server in background; failures land in the activity log
    let metrics_for_server = Arc::clone(&metrics);
    tokio::spawn(async move {
        let _ = server::run_with_dashboard(config, metrics_for_server, event_tx).await;
    });

    let mut state = DashboardState::new();

    // Main loop
    let tick_rate = Duration::from_millis(100);
    let mut should_quit = false;

    while !should_quit {
        // Handle server events
        while let Ok(event) = event_rx.try_recv() {
            if let ServerEvent::Failed(_) = event {
                metrics.write().log(LogLevel::Warning, "Server stopped - press Q to exit");
            }
            if state.follow {
                state.log_scroll = 0;
            }
        }

        // Draw
        terminal.draw(|f| draw(f, &metrics, &state))?;

        // Handle input
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let log_count = metrics.read().logs.len();
                    should_quit = state.handle_key(key, log_count);
                }
            }
        }
    }

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}

/// Draw the dashboard
fn draw(f: &mut Frame, metrics: &Arc<RwLock<Metrics>>, state: &DashboardState) {
    let m = metrics.read();

    // Main layout
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Length(5),  // Stats
            Constraint::Min(10),    // Logs
            Constraint::Length(1),  // Footer
        ])
        .split(f.area());

    // Header
    draw_header(f, chunks[0], &m);

    // Stats
    draw_stats(f, chunks[1], &m);

    // Logs
    draw_logs(f, chunks[2], &m, state);

    // Footer
    draw_footer(f, chunks[3], state);
}

fn draw_header(f: &mut Frame, area: Rect, m: &Metrics) {
    let status_style = match m.status {
        ServerStatus::Starting => Style::default().fg(Color::Yellow),
        ServerStatus::Running => Style::default().fg(Color::Green),
        ServerStatus::Error => Style::default().fg(Color::Red),
    };

    let status_text = match m.status {
        ServerStatus::Starting => "STARTING",
        ServerStatus::Running => "RUNNING",
        ServerStatus::Error => "ERROR",
    };

    let title = vec![
        Line::from(vec![
            Span::styled("Jamroom Relay", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  │  Status: "),
            Span::styled(status_text, status_style),
            Span::raw("  │  Uptime: "),
            Span::styled(m.uptime(), Style::default().fg(Color::Cyan)),
        ])
    ];

    let header = Paragraph::new(title)
        .block(Block::default().borders(Borders::ALL).title(" Dashboard "));

    f.render_widget(header, area);
}

fn draw_stats(f: &mut Frame, area: Rect, m: &Metrics) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(34),
            Constraint::Percentage(33),
        ])
        .split(area);

    // Server Info
    let addr = m.listen_addr.clone().unwrap_or_else(|| "binding...".to_string());

    let server_info = vec![
        Line::from(vec![
            Span::raw("Address: "),
            Span::styled(addr, Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("Room TTL: "),
            Span::styled(format_ttl(m.room_ttl_secs), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("Pings: "),
            Span::styled(m.pings.to_string(), Style::default().fg(Color::White)),
        ]),
    ];

    let server_block = Paragraph::new(server_info)
        .block(Block::default().borders(Borders::ALL).title(" Server "));
    f.render_widget(server_block, chunks[0]);

    // Rooms
    let room_info = vec![
        Line::from(vec![
            Span::raw("Active: "),
            Span::styled(
                m.active_rooms.to_string(),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::raw("Created / Peak: "),
            Span::styled(
                format!("{} / {}", m.rooms_created, m.peak_rooms),
                Style::default().fg(Color::Magenta),
            ),
        ]),
        Line::from(vec![
            Span::raw("Joins / Expired: "),
            Span::styled(
                format!("{} / {}", m.joins, m.rooms_evicted),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    let room_block = Paragraph::new(room_info)
        .block(Block::default().borders(Borders::ALL).title(" Rooms "));
    f.render_widget(room_block, chunks[1]);

    // Traffic
    let traffic_info = vec![
        Line::from(vec![
            Span::raw("Commands relayed: "),
            Span::styled(m.commands_relayed.to_string(), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("Polls / Delivered: "),
            Span::styled(
                format!("{} / {}", m.polls_served, m.commands_delivered),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::raw("Not found: "),
            Span::styled(m.not_found.to_string(), Style::default().fg(Color::Red)),
        ]),
    ];

    let traffic_block = Paragraph::new(traffic_info)
        .block(Block::default().borders(Borders::ALL).title(" Traffic "));
    f.render_widget(traffic_block, chunks[2]);
}

fn draw_logs(f: &mut Frame, area: Rect, m: &Metrics, state: &DashboardState) {
    let visible_height = area.height.saturating_sub(2) as usize;
    let total_logs = m.logs.len();

    // Calculate which logs to show based on scroll position
    let log_items: Vec<ListItem> = m.logs
        .iter()
        .rev()
        .skip(state.log_scroll)
        .take(visible_height)
        .map(|entry| {
            let level_style = Style::default().fg(level_color(entry.level));

            let time = entry.timestamp.format("%H:%M:%S").to_string();

            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", time), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("[{}] ", entry.level.as_str()), level_style),
                Span::raw(&entry.message),
            ]))
        })
        .collect();

    // Title with scroll indicator
    let scroll_indicator = if state.follow {
        " [LIVE] ".to_string()
    } else if total_logs > 0 {
        format!(" [{}/{}] ", total_logs - state.log_scroll, total_logs)
    } else {
        String::new()
    };

    let logs = List::new(log_items)
        .block(Block::default().borders(Borders::ALL).title(format!(" Activity Log{}", scroll_indicator)));

    f.render_widget(logs, area);

    // Render scrollbar if there are more logs than visible
    if total_logs > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));

        let mut scrollbar_state = ScrollbarState::new(total_logs)
            .position(total_logs.saturating_sub(state.log_scroll + visible_height));

        f.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Info => Color::Blue,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
        LogLevel::Room => Color::Green,
        LogLevel::Command => Color::Magenta,
    }
}

fn key_hint(key: &str) -> Span<'_> {
    Span::styled(key, Style::default().fg(Color::Black).bg(Color::White))
}

fn draw_footer(f: &mut Frame, area: Rect, state: &DashboardState) {
    let (follow_text, follow_color) = if state.follow {
        ("ON ", Color::Green)
    } else {
        ("OFF", Color::Yellow)
    };

    let footer = Paragraph::new(Line::from(vec![
        key_hint(" Q "),
        Span::raw(" Quit  "),
        key_hint(" ↑↓ "),
        Span::raw(" Scroll  "),
        key_hint(" PgUp/Dn "),
        Span::raw(" Page  "),
        key_hint(" Home/End "),
        Span::raw(" Oldest/Newest  "),
        key_hint(" A "),
        Span::raw(" Follow: "),
        Span::styled(follow_text, Style::default().fg(follow_color)),
    ]));

    f.render_widget(footer, area);
}

fn format_ttl(secs: u64) -> String {
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(state: &mut DashboardState, code: KeyCode, log_count: usize) -> bool {
        state.handle_key(KeyEvent::new(code, KeyModifiers::NONE), log_count)
    }

    #[test]
    fn test_scrolling_pauses_and_resumes_follow() {
        let mut state = DashboardState::new();
        press(&mut state, KeyCode::Up, 30);
        press(&mut state, KeyCode::Char('k'), 30);
        assert_eq!(state.log_scroll, 2);
        assert!(!state.follow);

        press(&mut state, KeyCode::Down, 30);
        assert!(!state.follow);
        press(&mut state, KeyCode::Char('j'), 30);
        assert_eq!(state.log_scroll, 0);
        assert!(state.follow);
    }

    #[test]
    fn test_scroll_is_clamped_to_log() {
        let mut state = DashboardState::new();
        press(&mut state, KeyCode::PageUp, 4);
        assert_eq!(state.log_scroll, 3);
        press(&mut state, KeyCode::End, 4);
        assert_eq!(state.log_scroll, 0);
        press(&mut state, KeyCode::Home, 25);
        assert_eq!(state.log_scroll, 24);

        // Nothing to scroll through
        let mut empty = DashboardState::new();
        press(&mut empty, KeyCode::Up, 0);
        assert_eq!(empty.log_scroll, 0);
        assert!(empty.follow);
    }

    #[test]
    fn test_quit_keys() {
        let mut state = DashboardState::new();
        assert!(press(&mut state, KeyCode::Char('q'), 0));
        assert!(press(&mut state, KeyCode::Esc, 0));
        assert!(!press(&mut state, KeyCode::Char('c'), 0));
        assert!(state.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), 0));
    }

    #[test]
    fn test_toggle_follow_jumps_to_newest() {
        let mut state = DashboardState::new();
        press(&mut state, KeyCode::PageUp, 50);
        press(&mut state, KeyCode::Char('a'), 50);
        assert!(state.follow);
        assert_eq!(state.log_scroll, 0);
        press(&mut state, KeyCode::Char('a'), 50);
        assert!(!state.follow);
    }

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(3600), "1h");
        assert_eq!(format_ttl(300), "5m");
        assert_eq!(format_ttl(90), "90s");
    }
}
