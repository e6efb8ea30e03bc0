use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use donation_console::format::{format_inr, format_inr_compact};
use donation_console::status_view::{is_selectable, UploadedStatement};
use donation_console::{
    ClaimWorkflow, ConsoleConfig, ConsoleError, ConsoleResult, DisputeDesk,
    ReconciliationBackend, Session, StaffQueue, StatementUpload, StatusView,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Unclaimed,
    Statuses,
    Disputes,
    MyClaims,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Unclaimed => Page::Statuses,
            Page::Statuses => Page::Disputes,
            Page::Disputes => Page::MyClaims,
            Page::MyClaims => Page::Unclaimed,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Unclaimed => Page::MyClaims,
            Page::Statuses => Page::Unclaimed,
            Page::Disputes => Page::Statuses,
            Page::MyClaims => Page::Disputes,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Unclaimed => "Unclaimed",
            Page::Statuses => "Reconciliation",
            Page::Disputes => "Disputes",
            Page::MyClaims => "My Claims",
        }
    }
}

/// What the keyboard is currently typing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Keyword,
    UploadPath,
}

pub struct App<'a, B: ReconciliationBackend + ?Sized + 'static> {
    backend: Arc<B>,
    runtime: &'a Runtime,
    /// Statement upload running on the runtime while the UI keeps drawing
    pending_upload: Option<JoinHandle<ConsoleResult<UploadedStatement>>>,
    pub session: Session,
    pub current_page: Page,
    pub queue: StaffQueue,
    pub claim: ClaimWorkflow,
    pub status: StatusView,
    pub desk: DisputeDesk,
    pub unclaimed_state: TableState,
    pub donation_state: TableState,
    pub status_state: TableState,
    pub pending_state: TableState,
    pub claims_state: TableState,
    pub my_claims_state: TableState,
    pub input_mode: InputMode,
    pub input: String,
    pub message: Option<(String, bool)>,
}

fn step(state: &mut TableState, len: usize, delta: isize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(len as isize);
    state.select(Some(next as usize));
}

fn clamp(state: &mut TableState, len: usize) {
    match state.selected() {
        _ if len == 0 => state.select(None),
        Some(i) if i >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

impl<'a, B: ReconciliationBackend + ?Sized + 'static> App<'a, B> {
    pub fn new(backend: Arc<B>, runtime: &'a Runtime, session: Session, config: &ConsoleConfig) -> Self {
        Self {
            backend,
            runtime,
            pending_upload: None,
            queue: StaffQueue::new(session.clone(), config.page_size),
            claim: ClaimWorkflow::new(session.clone(), config.search_page_size),
            status: StatusView::new(session.clone(), config.page_size, config.refetch_delay),
            desk: DisputeDesk::new(session.clone(), config.page_size),
            session,
            current_page: Page::Unclaimed,
            unclaimed_state: TableState::default(),
            donation_state: TableState::default(),
            status_state: TableState::default(),
            pending_state: TableState::default(),
            claims_state: TableState::default(),
            my_claims_state: TableState::default(),
            input_mode: InputMode::Normal,
            input: String::new(),
            message: None,
        }
    }

    fn report<T>(&mut self, result: ConsoleResult<T>, success: impl FnOnce(T) -> String) {
        self.message = Some(match result {
            Ok(value) => (success(value), false),
            Err(err) => (err.user_message(), true),
        });
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load whatever the current page shows.
    pub fn load_current(&mut self) {
        let result = match self.current_page {
            Page::Unclaimed => self
                .runtime
                .block_on(self.queue.refresh(&*self.backend))
                .map(|_| ()),
            Page::Statuses => self
                .runtime
                .block_on(self.status.refresh(&*self.backend))
                .map(|_| ()),
            Page::Disputes => self
                .runtime
                .block_on(self.desk.refresh(&*self.backend))
                .map(|_| ()),
            Page::MyClaims => self.runtime.block_on(self.queue.load_my_claims(&*self.backend)),
        };
        if let Err(err) = result {
            self.message = Some((err.user_message(), true));
        }
        self.clamp_selections();
    }

    fn turn_page(&mut self, forward: bool) {
        let (page, total) = match self.current_page {
            Page::Unclaimed => (self.queue.page(), self.queue.transactions().total_pages()),
            Page::Statuses => (self.status.page(), self.status.rows().total_pages()),
            Page::Disputes => (self.desk.page(), self.desk.pending().total_pages()),
            Page::MyClaims => return,
        };
        let target = if forward {
            if page + 1 >= total {
                return;
            }
            page + 1
        } else {
            match page.checked_sub(1) {
                Some(p) => p,
                None => return,
            }
        };

        let result = match self.current_page {
            Page::Unclaimed => self.runtime.block_on(self.queue.load_transactions(&*self.backend, target)),
            Page::Statuses => self.runtime.block_on(self.status.fetch_page(&*self.backend, target)),
            _ => self.runtime.block_on(self.desk.load_pending(&*self.backend, target)),
        };
        if let Err(err) = result {
            self.message = Some((err.user_message(), true));
        }
        self.clamp_selections();
    }

    fn clamp_selections(&mut self) {
        clamp(&mut self.unclaimed_state, self.queue.transactions().content.len());
        clamp(&mut self.donation_state, self.claim.results().content.len());
        clamp(&mut self.status_state, self.status.rows().content.len());
        clamp(&mut self.pending_state, self.desk.visible_rows().len());
        clamp(
            &mut self.claims_state,
            self.desk.open_claims().map(|l| l.claims.len()).unwrap_or(0),
        );
        clamp(&mut self.my_claims_state, self.queue.my_claims().len());
    }

    // ------------------------------------------------------------------------
    // Staff: claim dialog
    // ------------------------------------------------------------------------

    fn open_claim_dialog(&mut self) {
        let Some(tx) = self
            .unclaimed_state
            .selected()
            .and_then(|i| self.queue.transactions().content.get(i))
            .cloned()
        else {
            return;
        };
        let result = self.runtime.block_on(self.claim.open_claim(&*self.backend, tx));
        if let Err(err) = result {
            self.message = Some((err.user_message(), true));
        }
        self.donation_state = TableState::default();
        self.clamp_selections();
    }

    fn run_search(&mut self) {
        let keyword = self.input.clone();
        let result = self.runtime.block_on(self.claim.search(&*self.backend, &keyword, 0));
        if let Err(err) = result {
            self.message = Some((err.user_message(), true));
        }
        self.clamp_selections();
    }

    fn search_page(&mut self, forward: bool) {
        let results = self.claim.results();
        let (page, total) = (results.number, results.total_pages());
        let target = if forward && page + 1 < total {
            page + 1
        } else if !forward && page > 0 {
            page - 1
        } else {
            return;
        };
        let keyword = self.claim.keyword().to_string();
        let result = self.runtime.block_on(self.claim.search(&*self.backend, &keyword, target));
        if let Err(err) = result {
            self.message = Some((err.user_message(), true));
        }
        self.clamp_selections();
    }

    fn pick_donation(&mut self) {
        let Some(id) = self
            .donation_state
            .selected()
            .and_then(|i| self.claim.results().content.get(i))
            .map(|d| d.id)
        else {
            return;
        };
        if let Err(err) = self.claim.select_donation(id) {
            self.message = Some((err.user_message(), true));
        }
    }

    fn confirm_claim(&mut self) {
        let result = self.runtime.block_on(self.claim.confirm_claim(&*self.backend));
        let refresh = result.as_ref().map(|r| r.refresh_transactions).unwrap_or(false);
        self.report(result, |_| "Claim submitted, pending admin approval".to_string());
        if refresh {
            self.load_current();
        }
    }

    // ------------------------------------------------------------------------
    // Reconciliation buckets
    // ------------------------------------------------------------------------

    fn cycle_bucket(&mut self) {
        let next = self.status.bucket().next();
        let result = self.runtime.block_on(self.status.switch_bucket(&*self.backend, next));
        if let Err(err) = result {
            self.message = Some((err.user_message(), true));
        }
        self.status_state = TableState::default();
        self.clamp_selections();
    }

    fn toggle_status_row(&mut self) {
        let Some(id) = self
            .status_state
            .selected()
            .and_then(|i| self.status.rows().content.get(i))
            .map(|r| r.id)
        else {
            return;
        };
        if let Err(err) = self.status.toggle_selection(id) {
            self.message = Some((err.user_message(), true));
        }
    }

    fn settle_selected(&mut self) {
        let result = self.runtime.block_on(self.status.manually_settle(&*self.backend));
        self.report(result, |n| format!("{n} transaction(s) settled"));
        self.clamp_selections();
    }

    fn upload_from_input(&mut self) {
        let path = self.input.trim().to_string();
        let upload = match StatementUpload::from_path(Path::new(&path)) {
            Ok(upload) => upload,
            Err(err) => {
                self.message = Some((format!("Cannot read {path}: {err}"), true));
                return;
            }
        };
        let job = match self.status.begin_upload(upload) {
            Ok(job) => job,
            Err(err) => {
                self.message = Some((err.user_message(), true));
                return;
            }
        };
        let backend = Arc::clone(&self.backend);
        self.pending_upload = Some(self.runtime.spawn(async move { job.run(&*backend).await }));
        self.message = Some(("Processing statement...".to_string(), false));
    }

    pub fn upload_in_flight(&self) -> bool {
        self.pending_upload.is_some()
    }

    /// Once the spawned upload is done, refetch and report. Called every tick.
    pub fn poll_upload(&mut self) {
        if !self.pending_upload.as_ref().is_some_and(|h| h.is_finished()) {
            return;
        }
        let Some(handle) = self.pending_upload.take() else {
            return;
        };
        let result = self
            .runtime
            .block_on(handle)
            .unwrap_or_else(|e| Err(ConsoleError::Transport(format!("upload task failed: {e}"))));
        let finished = self.runtime.block_on(self.status.finish_upload(&*self.backend, result));
        self.report(finished, |o| format!("Uploaded {}", o.file_name));
        self.clamp_selections();
    }

    // ------------------------------------------------------------------------
    // Admin: disputes
    // ------------------------------------------------------------------------

    fn selected_pending_id(&self) -> Option<i64> {
        self.pending_state
            .selected()
            .and_then(|i| self.desk.visible_rows().get(i).map(|r| r.reconciliation_id))
    }

    fn selected_claim_id(&self) -> Option<i64> {
        let list = self.desk.open_claims()?;
        self.claims_state
            .selected()
            .and_then(|i| list.claims.get(i))
            .map(|c| c.id)
    }

    fn open_claims(&mut self) {
        let Some(id) = self.selected_pending_id() else {
            return;
        };
        let result = self.runtime.block_on(self.desk.list_claims(&*self.backend, id));
        if let Err(err) = result {
            self.message = Some((err.user_message(), true));
        }
        self.claims_state = TableState::default();
        self.clamp_selections();
    }

    fn decide_open_claim(&mut self, approve: bool) {
        let Some(claim_id) = self.selected_claim_id() else {
            return;
        };
        let result = if approve {
            self.runtime.block_on(self.desk.approve(&*self.backend, claim_id))
        } else {
            self.runtime.block_on(self.desk.reject(&*self.backend, claim_id))
        };
        let verb = if approve { "approved" } else { "rejected" };
        self.report(result, |_| format!("Claim {claim_id} {verb}"));
        self.clamp_selections();
    }

    fn decide_inline(&mut self, approve: bool) {
        let Some(id) = self.selected_pending_id() else {
            return;
        };
        let result = if approve {
            self.runtime.block_on(self.desk.approve_inline(&*self.backend, id))
        } else {
            self.runtime.block_on(self.desk.reject_inline(&*self.backend, id))
        };
        let verb = if approve { "approved" } else { "rejected" };
        self.report(result, |claim_id| format!("Claim {claim_id} {verb}"));
        self.clamp_selections();
    }

    fn toggle_single_claim_mode(&mut self) {
        let enabled = !self.desk.single_claim_mode();
        self.desk.set_single_claim_mode(enabled);
        self.pending_state = TableState::default();
        self.clamp_selections();
    }

    fn toggle_bulk_row(&mut self) {
        let Some(id) = self.selected_pending_id() else {
            return;
        };
        if let Err(err) = self.desk.toggle_bulk_selection(id) {
            self.message = Some((err.user_message(), true));
        }
    }

    fn bulk_approve(&mut self) {
        let result = self.runtime.block_on(self.desk.bulk_approve(&*self.backend));
        self.report(result, |n| format!("{n} transaction(s) approved"));
        self.clamp_selections();
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    fn move_cursor(&mut self, delta: isize) {
        match self.current_page {
            Page::Unclaimed if self.claim.is_open() => {
                let len = self.claim.results().content.len();
                step(&mut self.donation_state, len, delta)
            }
            Page::Unclaimed => {
                let len = self.queue.transactions().content.len();
                step(&mut self.unclaimed_state, len, delta)
            }
            Page::Statuses => {
                let len = self.status.rows().content.len();
                step(&mut self.status_state, len, delta)
            }
            Page::Disputes if self.desk.open_claims().is_some() => {
                let len = self.desk.open_claims().map(|l| l.claims.len()).unwrap_or(0);
                step(&mut self.claims_state, len, delta)
            }
            Page::Disputes => {
                let len = self.desk.visible_rows().len();
                step(&mut self.pending_state, len, delta)
            }
            Page::MyClaims => {
                let len = self.queue.my_claims().len();
                step(&mut self.my_claims_state, len, delta)
            }
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input.clear();
            }
            KeyCode::Enter => {
                let mode = self.input_mode;
                self.input_mode = InputMode::Normal;
                match mode {
                    InputMode::Keyword => self.run_search(),
                    InputMode::UploadPath => self.upload_from_input(),
                    InputMode::Normal => {}
                }
                self.input.clear();
            }
            KeyCode::Backspace => {
                self.input.pop();
                if self.input_mode == InputMode::Keyword {
                    self.claim.set_keyword(self.input.clone());
                }
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                if self.input_mode == InputMode::Keyword {
                    self.claim.set_keyword(self.input.clone());
                }
            }
            _ => {}
        }
    }

    /// Returns false when the console should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.input_mode != InputMode::Normal {
            self.handle_input_key(key);
            return true;
        }
        self.message = None;

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc => {
                if self.claim.is_open() {
                    self.claim.close();
                } else if self.desk.open_claims().is_some() {
                    self.desk.close_claims();
                } else {
                    return false;
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) || key.code == KeyCode::BackTab {
                    self.current_page = self.current_page.previous();
                } else {
                    self.current_page = self.current_page.next();
                }
                self.load_current();
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::PageDown => self.move_cursor(20),
            KeyCode::PageUp => self.move_cursor(-20),

            // Claim dialog
            KeyCode::Char('/') if self.claim.is_open() => {
                self.input = self.claim.keyword().to_string();
                self.input_mode = InputMode::Keyword;
            }
            KeyCode::Char(' ') if self.claim.is_open() => self.pick_donation(),
            KeyCode::Char('c') if self.claim.is_open() => self.confirm_claim(),
            KeyCode::Char(']') if self.claim.is_open() => self.search_page(true),
            KeyCode::Char('[') if self.claim.is_open() => self.search_page(false),

            KeyCode::Char(']') => self.turn_page(true),
            KeyCode::Char('[') => self.turn_page(false),
            KeyCode::Char('r') => self.load_current(),

            KeyCode::Enter if self.current_page == Page::Unclaimed && !self.claim.is_open() => self.open_claim_dialog(),

            KeyCode::Char('b') if self.current_page == Page::Statuses => self.cycle_bucket(),
            KeyCode::Char(' ') if self.current_page == Page::Statuses => self.toggle_status_row(),
            KeyCode::Char('a') if self.current_page == Page::Statuses => {
                self.status.select_all_selectable()
            }
            KeyCode::Char('x') if self.current_page == Page::Statuses => self.status.clear_selection(),
            KeyCode::Char('s') if self.current_page == Page::Statuses => self.settle_selected(),
            KeyCode::Char('u') if self.current_page == Page::Statuses => {
                if self.upload_in_flight() {
                    self.message = Some(("A statement is still processing".to_string(), true));
                } else if let Err(err) = self.session.require_admin("upload statements") {
                    self.message = Some((err.user_message(), true));
                } else {
                    self.input.clear();
                    self.input_mode = InputMode::UploadPath;
                }
            }

            KeyCode::Char('a') if self.current_page == Page::Disputes && self.desk.open_claims().is_some() => {
                self.decide_open_claim(true)
            }
            KeyCode::Char('d') if self.current_page == Page::Disputes && self.desk.open_claims().is_some() => {
                self.decide_open_claim(false)
            }
            KeyCode::Enter if self.current_page == Page::Disputes => self.open_claims(),
            KeyCode::Char('1') if self.current_page == Page::Disputes => self.toggle_single_claim_mode(),
            KeyCode::Char('A') if self.current_page == Page::Disputes => self.decide_inline(true),
            KeyCode::Char('D') if self.current_page == Page::Disputes => self.decide_inline(false),
            KeyCode::Char(' ') if self.current_page == Page::Disputes => self.toggle_bulk_row(),
            KeyCode::Char('B') if self.current_page == Page::Disputes => self.bulk_approve(),
            _ => {}
        }
        true
    }
}

// ============================================================================
// TERMINAL LOOP
// ============================================================================

pub fn run_ui<B: ReconciliationBackend + ?Sized + 'static>(app: &mut App<'_, B>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<T: ratatui::backend::Backend, B: ReconciliationBackend + ?Sized + 'static>(
    terminal: &mut Terminal<T>,
    app: &mut App<'_, B>,
) -> io::Result<()> {
    app.load_current();
    loop {
        app.poll_upload();
        terminal.draw(|f| ui(f, app))?;

        // Poll with a tick so an upload in flight keeps the screen live
        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, app: &mut App<'_, B>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Unclaimed => render_unclaimed(f, chunks[1], app),
        Page::Statuses => render_statuses(f, chunks[1], app),
        Page::Disputes => render_disputes(f, chunks[1], app),
        Page::MyClaims => render_my_claims(f, chunks[1], app),
    }

    if app.claim.is_open() && app.current_page == Page::Unclaimed {
        render_claim_dialog(f, centered(f.size(), 80, 70), app);
    }

    render_status_bar(f, chunks[2], app);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn titled(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn highlight() -> Style {
    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn render_header<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, area: Rect, app: &App<'_, B>) {
    let pages = [Page::Unclaimed, Page::Statuses, Page::Disputes, Page::MyClaims];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Staff #{} ({})", app.session.staff_id, app.session.role),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, area);
}

fn render_unclaimed<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, area: Rect, app: &mut App<'_, B>) {
    let page = app.queue.transactions();
    let rows = page.content.iter().map(|tx| {
        Row::new(vec![
            Cell::from(tx.transaction_date.clone()),
            Cell::from(truncate(&tx.transaction_id, 24)),
            Cell::from(tx.transaction_mode.clone()),
            Cell::from(format_inr(tx.transaction_amount)).style(Style::default().fg(Color::Green)),
            Cell::from(tx.reconciliation_status.as_str()),
        ])
    });

    let title = format!(
        " Unclaimed Transactions - page {}/{} ",
        page.number + 1,
        page.total_pages().max(1)
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(26),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&["Date", "Bank Ref", "Mode", "Amount", "Status"]))
    .block(titled(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.unclaimed_state);
}

fn render_claim_dialog<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, area: Rect, app: &mut App<'_, B>) {
    f.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let (tx_line, amount) = match app.claim.transaction() {
        Some(tx) => (
            format!("{}  {}  {}", tx.transaction_id, tx.transaction_date, tx.transaction_mode),
            format_inr(tx.transaction_amount),
        ),
        None => (String::new(), String::new()),
    };
    let keyword = if app.input_mode == InputMode::Keyword {
        format!("{}▏", app.input)
    } else {
        app.claim.keyword().to_string()
    };
    let info = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Bank: ", Style::default().fg(Color::Cyan)),
            Span::raw(tx_line),
            Span::raw("  "),
            Span::styled(amount, Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::styled("Search: ", Style::default().fg(Color::Cyan)),
            Span::raw(keyword),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Claim Transaction "),
    );
    f.render_widget(info, chunks[0]);

    let selected_id = app.claim.selected().map(|d| d.id);
    let results = app.claim.results();
    let rows = results.content.iter().map(|d| {
        let marker = if Some(d.id) == selected_id { "●" } else { " " };
        Row::new(vec![
            Cell::from(marker).style(Style::default().fg(Color::Green)),
            Cell::from(truncate(&d.donor.name, 28)),
            Cell::from(format_inr(d.amount)),
            Cell::from(d.donation_date.clone().unwrap_or_default()),
            Cell::from(d.donation_source.clone().unwrap_or_default()),
        ])
    });
    let title = format!(
        " Donations - page {}/{} ",
        results.number + 1,
        results.total_pages().max(1)
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(30),
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(10),
        ],
    )
    .header(header_row(&["", "Donor", "Amount", "Date", "Source"]))
    .block(titled(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");
    f.render_stateful_widget(table, chunks[1], &mut app.donation_state);

    let confirm_style = if app.claim.can_confirm() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut footer = vec![
        Span::styled("/", Style::default().fg(Color::Yellow)),
        Span::raw(" Search | "),
        Span::styled("Space", Style::default().fg(Color::Yellow)),
        Span::raw(" Select | "),
        Span::styled("c Confirm", confirm_style),
        Span::raw(" | "),
        Span::styled("Esc", Style::default().fg(Color::Red)),
        Span::raw(" Cancel"),
    ];
    if let Some(err) = app.claim.last_error() {
        footer.push(Span::raw("  "));
        footer.push(Span::styled(err.to_string(), Style::default().fg(Color::Red)));
    }
    f.render_widget(
        Paragraph::new(vec![Line::from(footer)]).block(Block::default().borders(Borders::ALL)),
        chunks[2],
    );
}

fn render_statuses<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, area: Rect, app: &mut App<'_, B>) {
    let page = app.status.rows();
    let rows = page.content.iter().map(|tx| {
        let marker = if !is_selectable(tx) {
            " "
        } else if app.status.is_selected(tx.id) {
            "☑"
        } else {
            "☐"
        };
        let color = match tx.reconciliation_status.as_str() {
            "SETTLED" => Color::Green,
            "MATCHED" => Color::Cyan,
            "NOT_FOUND" => Color::Red,
            _ => Color::Yellow,
        };
        Row::new(vec![
            Cell::from(marker),
            Cell::from(tx.transaction_date.clone()),
            Cell::from(truncate(&tx.transaction_id, 24)),
            Cell::from(tx.transaction_mode.clone()),
            Cell::from(format_inr_compact(tx.transaction_amount)),
            Cell::from(tx.reconciliation_status.as_str()).style(Style::default().fg(color)),
            Cell::from(format!("{}", tx.claims_count)),
        ])
    });

    let mut title = format!(
        " {} - page {}/{} - {} selected ",
        app.status.bucket().title(),
        page.number + 1,
        page.total_pages().max(1),
        app.status.selected_ids().len()
    );
    if app.status.is_processing() {
        title.push_str("- processing ");
    }
    if app.input_mode == InputMode::UploadPath {
        title = format!(" Upload statement: {}▏ ", app.input);
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(12),
            Constraint::Length(26),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(7),
        ],
    )
    .header(header_row(&["", "Date", "Bank Ref", "Mode", "Amount", "Status", "Claims"]))
    .block(titled(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.status_state);
}

fn render_disputes<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, area: Rect, app: &mut App<'_, B>) {
    let chunks = if app.desk.open_claims().is_some() {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)])
            .split(area)
    };

    let selected = app.desk.selected_ids();
    let single = app.desk.single_claim_mode();
    let rows: Vec<Row> = app
        .desk
        .visible_rows()
        .into_iter()
        .map(|p| {
            let marker = if !single {
                " "
            } else if selected.contains(&p.reconciliation_id) {
                "☑"
            } else {
                "☐"
            };
            let count_color = if p.is_single_claim() { Color::Green } else { Color::Red };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(p.bank_date.clone()),
                Cell::from(truncate(&p.bank_transaction_id, 24)),
                Cell::from(p.bank_amount.map(format_inr).unwrap_or_else(|| "-".to_string())),
                Cell::from(format!("{}", p.claims_count)).style(Style::default().fg(count_color)),
            ])
        })
        .collect();

    let title = format!(
        " Pending Claims{} - page {}/{} ",
        if single { " (single-claim)" } else { "" },
        app.desk.page() + 1,
        app.desk.pending().total_pages().max(1)
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(12),
            Constraint::Length(26),
            Constraint::Length(16),
            Constraint::Length(7),
        ],
    )
    .header(header_row(&["", "Date", "Bank Ref", "Amount", "Claims"]))
    .block(titled(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");
    f.render_stateful_widget(table, chunks[0], &mut app.pending_state);

    let Some(list) = app.desk.open_claims() else {
        return;
    };
    let rows: Vec<Row> = list
        .claims
        .iter()
        .map(|c| {
            let actions = app.desk.available_actions(c);
            let status_color = match c.dispute_status.label() {
                "Approved" => Color::Green,
                "Rejected" => Color::Red,
                _ => Color::Yellow,
            };
            Row::new(vec![
                Cell::from(truncate(&c.staff_name, 16)),
                Cell::from(truncate(&c.donor_name, 18)),
                Cell::from(format_inr_compact(c.donation_amount)),
                Cell::from(c.dispute_status.label()).style(Style::default().fg(status_color)),
                Cell::from(if actions.is_empty() { "" } else { "a/d" }),
            ])
        })
        .collect();
    let title = format!(" Claims on #{} ", list.reconciliation_id);
    let claims = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(15),
            Constraint::Length(4),
        ],
    )
    .header(header_row(&["Staff", "Donor", "Amount", "Status", ""]))
    .block(titled(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");
    f.render_stateful_widget(claims, chunks[1], &mut app.claims_state);
}

fn render_my_claims<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, area: Rect, app: &mut App<'_, B>) {
    let rows = app.queue.my_claims().iter().map(|c| {
        Row::new(vec![
            Cell::from(c.bank_transaction_date.clone()),
            Cell::from(truncate(&c.bank_transaction_id, 24)),
            Cell::from(truncate(&c.donor_name, 22)),
            Cell::from(format_inr(c.donation_amount)),
            Cell::from(c.dispute_status.label()),
            Cell::from(c.reviewed_at.clone().unwrap_or_default()),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(26),
            Constraint::Length(24),
            Constraint::Length(16),
            Constraint::Length(15),
            Constraint::Length(20),
        ],
    )
    .header(header_row(&["Date", "Bank Ref", "Donor", "Amount", "Status", "Reviewed"]))
    .block(titled(format!(" My Claims ({}) ", app.queue.my_claims().len())))
    .highlight_style(highlight())
    .highlight_symbol("→ ");
    f.render_stateful_widget(table, area, &mut app.my_claims_state);
}

fn render_status_bar<B: ReconciliationBackend + ?Sized + 'static>(f: &mut Frame, area: Rect, app: &App<'_, B>) {
    let mut status_spans = vec![];

    if let Some((text, is_error)) = &app.message {
        let color = if *is_error { Color::Red } else { Color::Green };
        status_spans.push(Span::styled(format!(" {text} "), Style::default().fg(color)));
        status_spans.push(Span::raw(" | "));
    }

    let hints: &[(&str, &str)] = match app.current_page {
        Page::Unclaimed => &[("Enter", "Claim"), ("[/]", "Page"), ("r", "Refresh")],
        Page::Statuses => &[
            ("b", "Bucket"),
            ("Space", "Select"),
            ("s", "Settle"),
            ("u", "Upload"),
        ],
        Page::Disputes => &[
            ("Enter", "Claims"),
            ("a/d", "Approve/Reject"),
            ("1", "Single"),
            ("A/D", "Inline"),
            ("B", "Bulk"),
        ],
        Page::MyClaims => &[("r", "Refresh")],
    };
    for (key, label) in hints {
        status_spans.push(Span::styled(key.to_string(), Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(format!(" {label} | ")));
    }
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
