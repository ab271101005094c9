//! Preview view: tab bar, editors and path fields on the left, graphic and
//! command output on the right

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
};

use crate::cli::tui::app::{App, Focus, PathField, HELP};
use crate::cli::tui::utils::{
    display_width, horizontal_offset, truncate_start, truncate_str, visible_offset,
};
use crate::domain::{human_size, TextBuffer};

/// Rows of the command editor when expanded, borders included
const CMD_PANEL_HEIGHT: u16 = 10;

/// Rows of the graphic details pane, borders included
const GRAPHIC_PANE_HEIGHT: u16 = 8;

/// Screen areas of the preview window
#[derive(Debug, Clone, Copy)]
pub struct PreviewLayout {
    pub tabs: Rect,
    /// Command editor, or a one-line header while collapsed
    pub cmd: Rect,
    pub script: Rect,
    pub scratch: Rect,
    pub input_file: Rect,
    pub output_file: Rect,
    pub cmd_file: Rect,
    pub graphic: Rect,
    pub output: Rect,
    pub status: Rect,
}

impl PreviewLayout {
    fn field(&self, field: PathField) -> Rect {
        match field {
            PathField::Input => self.input_file,
            PathField::Output => self.output_file,
            PathField::Cmd => self.cmd_file,
        }
    }
}

/// Split the screen; shared with the app so editors know their height
pub fn layout(area: Rect, cmd_expanded: bool) -> PreviewLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Length(if cmd_expanded { CMD_PANEL_HEIGHT } else { 1 }),
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Status bar
        ])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[2]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Script
            Constraint::Length(1), // Scratch folder
            Constraint::Length(3), // Input file
            Constraint::Length(3), // Output file
            Constraint::Length(3), // Cmd file
        ])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(GRAPHIC_PANE_HEIGHT),
            Constraint::Min(3),
        ])
        .split(columns[1]);

    PreviewLayout {
        tabs: rows[0],
        cmd: rows[1],
        script: left[0],
        scratch: left[1],
        input_file: left[2],
        output_file: left[3],
        cmd_file: left[4],
        graphic: right[0],
        output: right[1],
        status: rows[3],
    }
}

/// Draw the preview window
pub fn draw(frame: &mut Frame, app: &App) {
    let areas = layout(frame.area(), app.cmd_expanded());
    let tab = app.active_tab();
    let session = tab.session();

    draw_tabs(frame, app, areas.tabs);

    if app.cmd_expanded() {
        draw_editor(
            frame,
            session.cmd(),
            "Command (Ctrl+K to hide)",
            app.focus() == Focus::Cmd,
            areas.cmd,
        );
    } else {
        let header = Paragraph::new(format!(
            "> Command: {} (Ctrl+K to edit)",
            session.workspace().cmd_file().display()
        ))
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(header, areas.cmd);
    }

    draw_editor(
        frame,
        session.script(),
        "Script",
        app.focus() == Focus::Script,
        areas.script,
    );

    let scratch = format!(
        " Scratch: {}",
        session.workspace().scratch_dir().display()
    );
    frame.render_widget(
        Paragraph::new(truncate_start(&scratch, areas.scratch.width as usize))
            .style(Style::default().fg(Color::DarkGray)),
        areas.scratch,
    );

    for field in [PathField::Input, PathField::Output, PathField::Cmd] {
        draw_field(frame, app, field, areas.field(field));
    }

    draw_graphic_pane(frame, app, areas.graphic);
    draw_output_pane(frame, app, areas.output);
    draw_status_bar(frame, app, areas.status);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

/// Draw the tab bar
fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<String> = app
        .tabs()
        .iter()
        .map(|t| {
            let session = t.session();
            let marker = if session.is_running() {
                " ~"
            } else if session.is_pending() {
                " *"
            } else {
                ""
            };
            format!("{}{}", session.preset().label(), marker)
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().title("eview").borders(Borders::ALL))
        .select(app.active_index())
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

/// Draw a text editor and place the cursor in it when focused
fn draw_editor(frame: &mut Frame, buffer: &TextBuffer, title: &str, focused: bool, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let width = area.width.saturating_sub(2) as usize;
    let (row, col) = buffer.cursor();
    let offset = visible_offset(buffer.scroll(), row, height);

    // Scroll horizontally only when the cursor would leave the pane
    let current = buffer.lines().get(row).map(String::as_str).unwrap_or("");
    let h_offset = horizontal_offset(current, col, width);

    let lines: Vec<Line> = buffer
        .lines()
        .iter()
        .skip(offset)
        .take(height)
        .map(|l| Line::raw(l.chars().skip(h_offset).collect::<String>()))
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(border_style(focused)),
    );
    frame.render_widget(paragraph, area);

    if focused && height > 0 && width > 0 {
        let before: String = current.chars().skip(h_offset).take(col - h_offset).collect();
        let x = area.x + 1 + display_width(&before) as u16;
        let y = area.y + 1 + (row - offset) as u16;
        frame.set_cursor_position(Position::new(x, y));
    }
}

/// Draw a single-line path input
fn draw_field(frame: &mut Frame, app: &App, field: PathField, area: Rect) {
    let focused = app.focus() == Focus::Field(field);
    let value = app.active_tab().field(field);
    let width = area.width.saturating_sub(3) as usize;
    let shown = truncate_start(value, width);

    let paragraph = Paragraph::new(shown.clone()).block(
        Block::default()
            .title(field.label())
            .borders(Borders::ALL)
            .border_style(border_style(focused)),
    );
    frame.render_widget(paragraph, area);

    if focused && area.height > 2 {
        let x = area.x + 1 + display_width(&shown) as u16;
        frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

/// Draw the details of the last graphic
fn draw_graphic_pane(frame: &mut Frame, app: &App, area: Rect) {
    let session = app.active_tab().session();
    let width = area.width.saturating_sub(2) as usize;

    let lines: Vec<Line> = match session.last_outcome() {
        Some(outcome) => match &outcome.graphic {
            Some(graphic) => {
                let dimensions = graphic
                    .dimensions
                    .map(|(w, h)| format!("{}x{}", w, h))
                    .unwrap_or_else(|| "unknown".to_string());
                vec![
                    Line::raw(format!("Format: {}", graphic.format)),
                    Line::raw(format!("Size:   {}", dimensions)),
                    Line::raw(format!("Bytes:  {}", human_size(graphic.size))),
                    Line::raw(format!(
                        "Path:   {}",
                        truncate_start(&graphic.path.display().to_string(), width.saturating_sub(8))
                    )),
                    Line::styled("Ctrl+O to open", Style::default().fg(Color::DarkGray)),
                ]
            }
            None => vec![Line::styled(
                "No graphic produced",
                Style::default().fg(Color::Red),
            )],
        },
        None if session.is_running() => vec![Line::raw("Rendering...")],
        None => vec![Line::styled("Not run yet", Style::default().fg(Color::DarkGray))],
    };

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(truncate_str(
                &format!("Graphic: {}", session.workspace().graphic_file().display()),
                width,
            ))
            .borders(Borders::ALL),
    );

    frame.render_widget(paragraph, area);
}

/// Draw the command output
fn draw_output_pane(frame: &mut Frame, app: &App, area: Rect) {
    let tab = app.active_tab();
    let session = tab.session();
    let focused = app.focus() == Focus::Output;

    let title = match session.last_outcome() {
        Some(outcome) if !session.is_running() => format!("Output ({})", outcome.describe()),
        _ => "Output".to_string(),
    };

    let style = match session.last_outcome() {
        Some(outcome) if !session.is_running() && !outcome.succeeded() => {
            Style::default().fg(Color::Red)
        }
        _ => Style::default(),
    };

    let paragraph = Paragraph::new(session.output().to_string())
        .style(style)
        .block(
            Block::default()
                .title(truncate_str(&title, area.width.saturating_sub(2) as usize))
                .borders(Borders::ALL)
                .border_style(border_style(focused)),
        )
        .wrap(Wrap { trim: false })
        .scroll((tab.output_scroll(), 0));

    frame.render_widget(paragraph, area);
}

/// Draw the status bar
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (content, style) = match app.status_message() {
        Some(msg) if msg.starts_with("Error") => (msg, Style::default().fg(Color::Red)),
        Some(msg) => (msg, Style::default().fg(Color::Yellow)),
        None if app.editing() => ("Esc:leave editor ^R:run ^E:$EDITOR F1:help ^Q:quit", Style::default()),
        None => (HELP, Style::default()),
    };

    let status_text = format!("[{}] {}", app.active_tab().session().preset().key, content);

    let paragraph = Paragraph::new(status_text)
        .style(style)
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(paragraph, area);
}
