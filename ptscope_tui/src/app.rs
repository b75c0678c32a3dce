//! The command loop: terminal lifecycle, keystrokes, command dispatch.

use crate::render;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ptscope::{parse_u64_auto, Session, DEFAULT_DUMP_SIZE};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// The interactive application: one session, one command buffer.
pub struct App {
    session: Session,
    cmd_buf: String,
    should_quit: bool,
}

impl App {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            cmd_buf: String::new(),
            should_quit: false,
        }
    }

    /// Sets the terminal up, connects, runs the loop, restores the terminal.
    pub fn run(mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.session.set_status("init: connecting to backend ...");
        self.draw(&mut terminal, None)?;
        self.session.connect();

        // A SIGINT from outside the raw-mode terminal (kill -INT) aborts a
        // blocked backend call instead of tearing the UI down.
        if let Some(cancel) = self.session.cancel_handle() {
            if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
                log::warn!("could not install SIGINT handler: {e}");
            }
        }

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> io::Result<()> {
        loop {
            self.draw(terminal, None)?;
            if let Event::Key(key) = event::read()? {
                self.handle_key(terminal, key)?;
            }
            if self.should_quit {
                self.session.close();
                return Ok(());
            }
        }
    }

    fn handle_key(&mut self, terminal: &mut Tui, key: KeyEvent) -> io::Result<()> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Backspace => {
                self.cmd_buf.pop();
            }
            KeyCode::Enter => {
                let cmd = self.cmd_buf.trim().to_string();
                self.cmd_buf.clear();
                self.execute_command(terminal, &cmd)?;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.cmd_buf.push(c);
            }
            _ => {}
        }
        Ok(())
    }

    fn execute_command(&mut self, terminal: &mut Tui, cmd: &str) -> io::Result<()> {
        if cmd.is_empty() {
            return Ok(());
        }
        match cmd {
            "q" => {
                self.session
                    .set_status("quit requested ... closing backend and ui");
                self.draw(terminal, None)?;
                self.should_quit = true;
            }
            "n" => self.blocking(terminal, "stepi", Session::step)?,
            "c" => self.blocking(terminal, "continue", Session::continue_)?,
            "p" => self.blocking(terminal, "pause", Session::pause)?,
            "r" => self.blocking(terminal, "refresh", Session::refresh)?,
            _ => {
                if let Some(arg) = cmd.strip_prefix("va ") {
                    self.inspect_command(terminal, arg.trim())?;
                } else if let Some(rest) = cmd.strip_prefix("md ") {
                    self.memdump_command(terminal, rest.trim())?;
                } else {
                    self.session.set_status(format!("unknown cmd: {cmd:?}"));
                }
            }
        }
        Ok(())
    }

    fn inspect_command(&mut self, terminal: &mut Tui, arg: &str) -> io::Result<()> {
        if arg.eq_ignore_ascii_case("rip") {
            self.blocking(terminal, "inspect", Session::set_inspect_rip)
        } else {
            match parse_u64_auto(arg) {
                Ok(va) => self.blocking(terminal, "inspect", |s| s.set_inspect_va(va)),
                Err(_) => {
                    self.session.set_status(format!("invalid VA: {arg:?}"));
                    Ok(())
                }
            }
        }
    }

    fn memdump_command(&mut self, terminal: &mut Tui, rest: &str) -> io::Result<()> {
        let mut parts = rest.split_whitespace();
        let Some(target) = parts.next() else {
            self.session.set_status("usage: md <va> [size]");
            return Ok(());
        };
        let size = parts
            .next()
            .and_then(|s| parse_u64_auto(s).ok())
            .map_or(DEFAULT_DUMP_SIZE, |n| n as usize);
        match parse_u64_auto(target) {
            Ok(va) => self.blocking(terminal, "memdump", |s| s.memdump(va, size)),
            Err(_) => {
                self.session
                    .set_status(format!("invalid VA for md: {target:?}"));
                Ok(())
            }
        }
    }

    // Backend calls block; redraw once with a disabled prompt first so the
    // user can see why input is dead.
    fn blocking(
        &mut self,
        terminal: &mut Tui,
        label: &str,
        op: impl FnOnce(&mut Session),
    ) -> io::Result<()> {
        self.session
            .set_status(format!("{label} ... (waiting for backend; input disabled)"));
        self.draw(terminal, Some("[waiting for backend ...]"))?;
        op(&mut self.session);
        self.draw(terminal, None)
    }

    fn draw(&mut self, terminal: &mut Tui, prompt_override: Option<&str>) -> io::Result<()> {
        let session = &self.session;
        let cmd = prompt_override.unwrap_or(&self.cmd_buf);
        terminal.draw(|frame| render::render(frame, session, cmd))?;
        Ok(())
    }
}
