//! Frame layout and widget rendering.
//!
//! Left pane: canonical registers. Right pane: page-table walk of the
//! inspected VA on top, memory dump below. Values that differ from the
//! previous snapshot render highlighted so single-steps are easy to follow.

use ptscope::target::{PteFlags, CANONICAL_REGISTERS, REGISTER_NA};
use ptscope::{PageInfo, Session};
use ratatui::layout::{Alignment, Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use std::collections::HashMap;

fn changed_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn title_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

/// Draws one complete frame.
pub fn render(frame: &mut Frame, session: &Session, cmd_buf: &str) {
    let chunks = Layout::vertical([
        Constraint::Length(1), // title
        Constraint::Min(8),    // content
        Constraint::Length(1), // status
        Constraint::Length(1), // prompt
    ])
    .split(frame.area());

    let title = Paragraph::new("[ptscope] QEMU x86_64 guest inspector")
        .style(title_style())
        .alignment(Alignment::Center);
    frame.render_widget(title, chunks[0]);

    render_content(frame, chunks[1], session);

    frame.render_widget(Paragraph::new(session.status()), chunks[2]);
    render_prompt(frame, chunks[3], cmd_buf);
}

fn render_content(frame: &mut Frame, area: Rect, session: &Session) {
    let cols =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).split(area);
    render_registers(frame, cols[0], session);

    let right =
        Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).split(cols[1]);
    render_page_info(frame, right[0], session);
    render_memdump(frame, right[1], session);
}

fn render_registers(frame: &mut Frame, area: Rect, session: &Session) {
    let lines: Vec<Line> = CANONICAL_REGISTERS
        .iter()
        .map(|name| {
            let value = session.regs().value(name);
            let prev = session.prev_regs().value(name);
            let text = format!("{name:>6} : {value}");
            if value != prev && value != REGISTER_NA {
                Line::styled(text, changed_style())
            } else {
                Line::raw(text)
            }
        })
        .collect();
    let block = Block::new()
        .borders(Borders::ALL)
        .title("Registers  [n:step  c:cont  p:pause  r:refresh  q:quit]");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_page_info(frame: &mut Frame, area: Rect, session: &Session) {
    let block = Block::new().borders(Borders::ALL).title(format!(
        "Page Info (mode: {})  [va <addr> | va rip]",
        session.inspect_mode()
    ));

    let lines: Vec<Line> = match session.page_info() {
        None => vec![Line::raw("(no page info)")],
        Some(PageInfo::Error(msg)) => {
            vec![Line::styled(
                format!("ERROR: {msg}"),
                Style::default().fg(Color::Red),
            )]
        }
        Some(info) => {
            let prev: HashMap<&str, String> = session
                .prev_page_info()
                .map(page_rows)
                .unwrap_or_default()
                .into_iter()
                .collect();
            page_rows(info)
                .into_iter()
                .map(|(key, value)| {
                    let text = format!("{key}: {value}");
                    let changed = prev.get(key).is_some_and(|old| *old != value);
                    if changed {
                        Line::styled(text, changed_style())
                    } else {
                        Line::raw(text)
                    }
                })
                .collect()
        }
    };
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_memdump(frame: &mut Frame, area: Rect, session: &Session) {
    let block = Block::new()
        .borders(Borders::ALL)
        .title("Mem Dump  [md <va> [size]]");
    let lines: Vec<Line> = session
        .mem_dump_lines()
        .iter()
        .map(|l| Line::raw(l.as_str()))
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_prompt(frame: &mut Frame, area: Rect, cmd_buf: &str) {
    let prompt = format!("cmd> {cmd_buf}");
    frame.render_widget(Paragraph::new(prompt.clone()), area);
    frame.set_cursor_position(Position::new(
        area.x + prompt.len().min(area.width as usize) as u16,
        area.y,
    ));
}

// The page-info pane as ordered key/value rows; also the unit the
// changed-row highlight compares on.
fn page_rows(info: &PageInfo) -> Vec<(&'static str, String)> {
    match info {
        PageInfo::Error(msg) => vec![("error", msg.clone())],
        PageInfo::Walk { walk, perm } => {
            let mut rows = vec![("va", format!("{:#x}", walk.va))];
            if let Some(perm) = perm {
                rows.push(("perm", perm.clone()));
            }
            rows.push(("present", walk.present.to_string()));
            rows.push((
                "page_size",
                walk.page_size.map_or_else(|| "-".to_string(), |s| s.to_string()),
            ));
            rows.push(("level", walk.level.to_string()));
            rows.push(("cr3", format!("{:#x}", walk.cr3)));
            rows.push(("pml4_index", walk.indices.pml4.to_string()));
            rows.push(("pdpt_index", walk.indices.pdpt.to_string()));
            rows.push(("pd_index", walk.indices.pd.to_string()));
            rows.push(("pt_index", walk.indices.pt.to_string()));
            rows.push(("offset", format!("{:#x}", walk.indices.offset)));
            rows.push(("pml4_entry", format!("{:#018x}", walk.pml4_entry)));
            if let Some(entry) = walk.pdpt_entry {
                rows.push(("pdpt_entry", format!("{entry:#018x}")));
            }
            if let Some(entry) = walk.pd_entry {
                rows.push(("pd_entry", format!("{entry:#018x}")));
            }
            if let Some(entry) = walk.pt_entry {
                rows.push(("pt_entry", format!("{entry:#018x}")));
            }
            if let Some(page_phys) = walk.page_phys {
                rows.push(("page_phys", format!("{page_phys:#x}")));
            }
            if let Some(phys_addr) = walk.phys_addr {
                rows.push(("phys_addr", format!("{phys_addr:#x}")));
            }
            if let Some(flags) = &walk.flags {
                rows.push(("flags", flags_summary(flags)));
            }
            rows
        }
    }
}

fn flags_summary(flags: &PteFlags) -> String {
    let named = [
        (flags.present, "present"),
        (flags.writable, "writable"),
        (flags.user, "user"),
        (flags.write_through, "write_through"),
        (flags.cache_disable, "cache_disable"),
        (flags.accessed, "accessed"),
        (flags.dirty, "dirty"),
        (flags.page_size, "page_size"),
        (flags.global, "global"),
        (flags.nx, "nx"),
    ];
    let set: Vec<&str> = named
        .iter()
        .filter_map(|(on, name)| on.then_some(*name))
        .collect();
    if set.is_empty() {
        "-".to_string()
    } else {
        set.join(" ")
    }
}
