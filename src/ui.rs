use anyhow::{Context, Result};
use async_trait::async_trait;
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout, Write};
use tokio::runtime::Runtime;

use crate::config::{Backend, Config};
use crate::detail::{DetailPage, Presenter};
use crate::drafts::{DraftStore, MemoryDraftStore, SqliteDraftStore};
use crate::models::{Alert, Confirm, Field, PageView, Popup, Route};
use crate::service::{HttpTaskService, LocalTaskService, TaskService};

const ENTRY_FIELDS: [Field; 4] = [Field::Task, Field::Description, Field::Priority, Field::DueDate];

/// Shows the page in the terminal and answers dialogs from the keyboard.
pub struct TerminalPresenter {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    focus: Field,
    left: bool,
}

impl TerminalPresenter {
    fn new(terminal: Terminal<CrosstermBackend<Stdout>>) -> Self {
        TerminalPresenter {
            terminal,
            focus: Field::Task,
            left: false,
        }
    }

    pub fn draw(&mut self, view: &PageView, popup: Option<&Popup>) -> io::Result<()> {
        let focus = self.focus;
        self.terminal.draw(|f| render_page(f, view, focus, popup))?;
        Ok(())
    }

    /// Redraws with the popup until one of `keys` is pressed.
    fn wait_for(&mut self, view: &PageView, popup: &Popup, keys: &[(KeyCode, bool)]) -> io::Result<bool> {
        loop {
            self.draw(view, Some(popup))?;
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some((_, answer)) = keys.iter().find(|(code, _)| *code == key.code) {
                    return Ok(*answer);
                }
            }
        }
    }
}

#[async_trait]
impl Presenter for TerminalPresenter {
    async fn alert(&mut self, view: &PageView, alert: Alert) {
        let popup = Popup::Alert(alert);
        let keys = [(KeyCode::Enter, true), (KeyCode::Esc, true), (KeyCode::Char(' '), true)];
        if let Err(e) = self.wait_for(view, &popup, &keys) {
            log::error!("Failed to show alert: {}", e);
        }
    }

    async fn confirm(&mut self, view: &PageView, confirm: Confirm) -> bool {
        let popup = Popup::Confirm(confirm);
        let keys = [
            (KeyCode::Char('y'), true),
            (KeyCode::Char('Y'), true),
            (KeyCode::Enter, true),
            (KeyCode::Char('n'), false),
            (KeyCode::Char('N'), false),
            (KeyCode::Esc, false),
        ];
        match self.wait_for(view, &popup, &keys) {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("Failed to show confirmation: {}", e);
                false
            }
        }
    }

    async fn navigate_back(&mut self) {
        self.left = true;
    }
}

pub fn run_detail_page(config: &Config, route: Route) -> Result<()> {
    let store: Box<dyn DraftStore> = match SqliteDraftStore::open(&config.db_path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            log::warn!("Drafts will not persist, cannot open {}: {}", config.db_path.display(), e);
            Box::new(MemoryDraftStore::new())
        }
    };
    let service: Box<dyn TaskService> = match &config.backend {
        Backend::Local => Box::new(
            LocalTaskService::open(&config.db_path).context("Failed to open local task database")?,
        ),
        Backend::Remote { base_url } => Box::new(HttpTaskService::new(base_url.clone())),
    };
    let rt = Runtime::new()?;
    let terminal = enter_terminal()?;

    let mut page = DetailPage::new(store, service, TerminalPresenter::new(terminal), route);
    let res = run_page(&rt, &mut page);

    let presenter = page.presenter_mut();
    restore_terminal(presenter.terminal.backend_mut())?;
    presenter.terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }
    if presenter.left {
        println!("Task {} was not found for user {}.", route.task_id, route.user_id);
    }

    Ok(())
}

/// Switches to raw mode and the alternate screen, undoing both if setup fails partway.
fn enter_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let setup = || -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        Terminal::new(CrosstermBackend::new(stdout))
    };

    match setup() {
        Ok(terminal) => Ok(terminal),
        Err(e) => {
            if let Err(restore) = restore_terminal(&mut io::stdout()) {
                log::error!("Failed to restore terminal: {}", restore);
            }
            Err(e).context("Failed to set up terminal")
        }
    }
}

fn restore_terminal<W: Write>(out: &mut W) -> io::Result<()> {
    let raw = disable_raw_mode();
    execute!(out, LeaveAlternateScreen, Show)?;
    raw
}

fn run_page<S, T>(rt: &Runtime, page: &mut DetailPage<S, T, TerminalPresenter>) -> io::Result<()>
where
    S: DraftStore,
    T: TaskService,
{
    rt.block_on(page.on_appear());

    loop {
        if page.presenter_mut().left {
            break;
        }

        let view = page.view().clone();
        page.presenter_mut().draw(&view, None)?;

        let Event::Key(key) = event::read()? else {
            continue;
        };

        let mut focus = page.presenter_mut().focus;
        let flow = handle_key(rt, page, &mut focus, key);
        page.presenter_mut().focus = focus;
        if flow == Flow::Quit {
            break;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Applies one key press to the page. `focus` is the field receiving typed text.
fn handle_key<S, T, P>(rt: &Runtime, page: &mut DetailPage<S, T, P>, focus: &mut Field, key: KeyEvent) -> Flow
where
    S: DraftStore,
    T: TaskService,
    P: Presenter,
{
    if key.kind != KeyEventKind::Press {
        return Flow::Continue;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('s') => page.save_draft(),
            KeyCode::Char('e') => rt.block_on(page.edit_and_save()),
            KeyCode::Char('d') => rt.block_on(page.delete_draft()),
            KeyCode::Char('r') => rt.block_on(page.on_appear()),
            KeyCode::Char('c') => return Flow::Quit,
            _ => {}
        }
        return Flow::Continue;
    }

    match key.code {
        KeyCode::Esc => return Flow::Quit,
        KeyCode::Tab | KeyCode::Down => *focus = focus.next(),
        KeyCode::BackTab | KeyCode::Up => *focus = focus.previous(),
        KeyCode::Char(' ') | KeyCode::Enter if *focus == Field::Completed => page.toggle_completed(),
        KeyCode::Char(c) if *focus != Field::Completed => {
            let mut text = page.field(*focus).to_string();
            text.push(c);
            page.set_field(*focus, text);
        }
        KeyCode::Backspace => {
            let mut text = page.field(*focus).to_string();
            text.pop();
            page.set_field(*focus, text);
        }
        _ => {}
    }
    Flow::Continue
}

fn render_page(f: &mut Frame, view: &PageView, focus: Field, popup: Option<&Popup>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let page_title = if view.page_title.is_empty() {
        "Task Detail"
    } else {
        view.page_title.as_str()
    };
    let header = if view.detail_visible {
        Paragraph::new(Span::styled(
            view.title_label.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
    } else {
        Paragraph::new(Span::styled("Loading task...", Style::default().fg(Color::DarkGray)))
    };
    f.render_widget(
        header.block(Block::default().borders(Borders::ALL).title(page_title)),
        chunks[0],
    );

    for (i, field) in ENTRY_FIELDS.iter().enumerate() {
        let text = match field {
            Field::Task => &view.task_entry,
            Field::Description => &view.description_entry,
            Field::Priority => &view.priority_entry,
            _ => &view.due_date_entry,
        };
        render_entry(f, chunks[i + 1], field.label(), text, *field == focus);
    }

    let checkbox = if view.is_completed { "[x] Completed" } else { "[ ] Completed" };
    render_entry(f, chunks[5], "Status", checkbox, focus == Field::Completed);

    let result = Paragraph::new(view.result_label.clone())
        .block(Block::default().borders(Borders::ALL).title("Result"))
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(result, chunks[6]);

    let help = Paragraph::new(Line::from(vec![
        Span::styled("Ctrl+S", Style::default().fg(Color::Yellow)),
        Span::raw(" save draft  "),
        Span::styled("Ctrl+E", Style::default().fg(Color::Yellow)),
        Span::raw(" edit & save  "),
        Span::styled("Ctrl+D", Style::default().fg(Color::Yellow)),
        Span::raw(" delete draft  "),
        Span::styled("Ctrl+R", Style::default().fg(Color::Yellow)),
        Span::raw(" reload  "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" next field  "),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::raw(" quit"),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[7]);

    if let Some(popup) = popup {
        render_popup(f, popup);
    }
}

fn render_entry(f: &mut Frame, area: Rect, label: &str, text: &str, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let mut spans = vec![Span::styled(text.to_string(), Style::default().fg(Color::White))];
    if focused {
        spans.push(Span::styled(" ", Style::default().bg(Color::Cyan)));
    }

    let entry = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(label.to_string()),
    );
    f.render_widget(entry, area);
}

fn render_popup(f: &mut Frame, popup: &Popup) {
    let (title, body) = match popup {
        Popup::Alert(alert) => (
            alert.title.as_str(),
            format!("{}\n\n[Enter] {}", alert.message, alert.accept),
        ),
        Popup::Confirm(confirm) => (
            confirm.title.as_str(),
            format!("{}\n\n[y] {}    [n] {}", confirm.message, confirm.accept, confirm.cancel),
        ),
    };

    let area = centered_rect(50, 25, f.area());
    f.render_widget(Clear, area);
    let content = Paragraph::new(body)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::DarkGray)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White));
    f.render_widget(content, area);
}

// Helper function to create centered rectangles for popups
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
