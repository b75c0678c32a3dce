use crate::target::{Guest, PteFlags, RegisterSnapshot, WalkResult, REGISTER_NA};
use crate::util::parse_u64_auto;
use crate::{BackendParams, CancelHandle, DbgError, DbgResult};

/// Default byte count for a memory dump.
pub const DEFAULT_DUMP_SIZE: usize = 64;

/// Execution state as the session has commanded it.
///
/// This is advisory: it reflects what the session asked the guest to do,
/// not asynchronous stops the backend may report on its own.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecState {
    /// No backend, or the backend went away.
    Disconnected,
    /// The guest is paused; registers and memory are meaningful.
    Stopped,
    /// A continue was accepted and no interrupt has succeeded since.
    Running,
}

/// Which virtual address the page-info pane follows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InspectMode {
    /// Follow the instruction pointer of the current snapshot.
    FollowRip,
    /// Inspect a user-chosen address.
    Manual(u64),
}

impl std::fmt::Display for InspectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::FollowRip => f.write_str("rip"),
            Self::Manual(_) => f.write_str("manual"),
        }
    }
}

/// What the page-info pane renders: a finished walk, or the error that
/// replaced it. Failed walks never leave a half-updated result behind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageInfo {
    /// A completed walk and the permission string derived from its flags.
    Walk {
        /// The walk itself.
        walk: WalkResult,
        /// `perm_from_flags` of the terminal entry, when the walk has one.
        perm: Option<String>,
    },
    /// The walk failed; the message is all there is to show.
    Error(String),
}

/// Derives the `RWX (ring)` permission summary from decoded entry flags.
#[must_use]
pub fn perm_from_flags(flags: &PteFlags) -> String {
    if !flags.present {
        return "no permission".to_string();
    }
    let w = if flags.writable { 'W' } else { '-' };
    let x = if flags.nx { '-' } else { 'X' };
    let ring = if flags.user { "user" } else { "kernel" };
    format!("R{w}{x} ({ring})")
}

/// Formats bytes as 16-per-row hex/ASCII dump lines, addresses ascending
/// from `base`.
#[must_use]
pub fn format_dump_lines(base: u64, data: &[u8]) -> Vec<String> {
    data.chunks(16)
        .enumerate()
        .map(|(row, chunk)| {
            let addr = base + (row * 16) as u64;
            let hexpart = chunk
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ");
            let asciipart: String = chunk
                .iter()
                .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
                .collect();
            format!("0x{addr:016x}: {hexpart:<47}  {asciipart}")
        })
        .collect()
}

/// The stateful debugging session the UI talks to.
///
/// Owns exactly one protocol client (through [`Guest`]); all methods are
/// driven by a single caller. Every state-changing operation goes through a
/// uniform envelope: on success the status reads `"<label> OK"`, on failure
/// the label and the error, and snapshots are only ever replaced whole.
/// The previous snapshot and walk exist so the UI can highlight deltas.
#[derive(Debug)]
pub struct Session {
    params: BackendParams,
    guest: Option<Guest>,
    state: ExecState,
    inspect_mode: InspectMode,
    regs: RegisterSnapshot,
    prev_regs: RegisterSnapshot,
    page_info: Option<PageInfo>,
    prev_page_info: Option<PageInfo>,
    mem_dump_lines: Vec<String>,
    status: String,
}

impl Session {
    /// A disconnected session; call [`Session::connect`] to bring it up.
    #[must_use]
    pub fn new(params: BackendParams) -> Self {
        Self {
            params,
            guest: None,
            state: ExecState::Disconnected,
            inspect_mode: InspectMode::FollowRip,
            regs: RegisterSnapshot::not_available(),
            prev_regs: RegisterSnapshot::not_available(),
            page_info: None,
            prev_page_info: None,
            mem_dump_lines: Vec::new(),
            status: "init: not connected yet".to_string(),
        }
    }

    /// Spawns and bootstraps the backend, then performs the initial
    /// register read and walk. Failures land in the status line; the
    /// session stays usable for a retry.
    pub fn connect(&mut self) {
        if self.guest.is_some() {
            self.status = "already connected".to_string();
            return;
        }
        match Guest::connect(self.params.clone()) {
            Ok(guest) => {
                self.guest = Some(guest);
                self.state = ExecState::Stopped;
                match self.refresh_snapshots() {
                    Ok(()) => {
                        self.status = format!(
                            "connected to {} (use n/c/p/r/q)",
                            self.params.target_addr()
                        );
                    }
                    Err(e) => self.status = format!("connect ERROR: {e}"),
                }
            }
            Err(e) => self.status = format!("connect ERROR: {e}"),
        }
    }

    /// Shuts the backend down and returns to `Disconnected`.
    pub fn close(&mut self) {
        if let Some(guest) = self.guest.take() {
            let _ = guest.close();
        }
        self.state = ExecState::Disconnected;
    }

    /// One machine instruction, then refresh. Refused while running.
    pub fn step(&mut self) {
        if self.refuse_while_running("stepi") {
            return;
        }
        self.run_action("stepi", true, Guest::step_instruction);
    }

    /// Resumes the guest. No refresh: register values of a running guest
    /// are meaningless.
    pub fn continue_(&mut self) {
        if self.state == ExecState::Running {
            self.status = "already running".to_string();
            return;
        }
        if self.run_action("continue", false, Guest::continue_execution) {
            self.state = ExecState::Running;
        }
    }

    /// Interrupts the guest, then refreshes. Also usable while stopped,
    /// where it amounts to a refresh.
    pub fn pause(&mut self) {
        self.run_action("pause (interrupt)", true, Guest::interrupt);
        if self.state == ExecState::Running {
            self.state = ExecState::Stopped;
        }
    }

    /// Re-reads registers and the walk without stepping the guest.
    pub fn refresh(&mut self) {
        if self.refuse_while_running("refresh") {
            return;
        }
        self.run_action("refresh", true, |_| Ok(()));
    }

    /// Follows the instruction pointer again. Refused while running.
    pub fn set_inspect_rip(&mut self) {
        if self.refuse_while_running("inspect") {
            return;
        }
        self.inspect_mode = InspectMode::FollowRip;
        self.update_page_info();
        self.status = "inspect mode: follow rip".to_string();
    }

    /// Pins the page-info pane to an explicit VA. Refused while running.
    pub fn set_inspect_va(&mut self, va: u64) {
        if self.refuse_while_running("inspect") {
            return;
        }
        self.inspect_mode = InspectMode::Manual(va);
        self.update_page_info();
        self.status = format!("inspect mode: va {va:#x}");
    }

    /// Reads and formats `size` bytes at `va`. Refused while running.
    pub fn memdump(&mut self, va: u64, size: usize) {
        if self.refuse_while_running("memdump") {
            return;
        }
        let label = format!("memdump {va:#x} ({size} bytes)");
        let result = match self.guest.as_ref() {
            None => Err(DbgError::NotConnected),
            Some(guest) => guest.read_virt_bytes(va, size),
        };
        match result {
            Ok(data) => {
                self.mem_dump_lines = format_dump_lines(va, &data);
                self.status = format!("{label} OK, lines={}", self.mem_dump_lines.len());
            }
            Err(DbgError::Canceled) => {
                self.status = format!("{label} CANCEL: interrupted by user");
            }
            Err(e) => {
                self.mem_dump_lines = vec![format!("memdump ERROR: {e}")];
                self.status = format!("{label} ERROR: {e}");
            }
        }
    }

    /// The VA the page-info pane currently follows, if there is one.
    #[must_use]
    pub fn current_inspect_va(&self) -> Option<u64> {
        match self.inspect_mode {
            InspectMode::Manual(va) => Some(va),
            InspectMode::FollowRip => {
                let rip = self.regs.value("rip");
                if rip == REGISTER_NA {
                    return None;
                }
                parse_u64_auto(rip).ok()
            }
        }
    }

    /// Current register snapshot.
    pub fn regs(&self) -> &RegisterSnapshot {
        &self.regs
    }

    /// The snapshot that was current before the last refresh.
    pub fn prev_regs(&self) -> &RegisterSnapshot {
        &self.prev_regs
    }

    /// Current page info, if a walk has run.
    pub fn page_info(&self) -> Option<&PageInfo> {
        self.page_info.as_ref()
    }

    /// The page info that was current before the last walk.
    pub fn prev_page_info(&self) -> Option<&PageInfo> {
        self.prev_page_info.as_ref()
    }

    /// The formatted lines of the last memory dump.
    pub fn mem_dump_lines(&self) -> &[String] {
        &self.mem_dump_lines
    }

    /// Outcome of the last command, human-readable.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Overwrites the status line (for UI prompts like "waiting…").
    pub fn set_status<S: Into<String>>(&mut self, status: S) {
        self.status = status.into();
    }

    /// The current inspect mode.
    pub fn inspect_mode(&self) -> InspectMode {
        self.inspect_mode
    }

    /// Whether a continue is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ExecState::Running
    }

    /// The session's execution state.
    pub fn state(&self) -> ExecState {
        self.state
    }

    /// Handle for aborting a blocked backend call from a signal handler.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.guest.as_ref().and_then(|g| g.cancel_handle().ok())
    }

    // The uniform failure envelope. Returns true on success.
    fn run_action(
        &mut self,
        label: &str,
        refresh: bool,
        action: impl FnOnce(&Guest) -> DbgResult<()>,
    ) -> bool {
        let result = match self.guest.as_ref() {
            None => Err(DbgError::NotConnected),
            Some(guest) => action(guest),
        };
        let result = result.and_then(|()| {
            if refresh {
                self.refresh_snapshots()
            } else {
                Ok(())
            }
        });
        match result {
            Ok(()) => {
                self.status = format!("{label} OK");
                true
            }
            Err(DbgError::Canceled) => {
                self.status = format!("{label} CANCEL: interrupted by user");
                false
            }
            Err(e) => {
                self.status = format!("{label} ERROR: {e}");
                false
            }
        }
    }

    fn refuse_while_running(&mut self, label: &str) -> bool {
        if self.state == ExecState::Running {
            self.status = format!(
                "{label} ERROR: {}",
                DbgError::InvalidState("guest is running; pause first")
            );
            true
        } else {
            false
        }
    }

    // Reads a full new snapshot before committing anything, so a failure
    // leaves both current and previous untouched.
    fn refresh_snapshots(&mut self) -> DbgResult<()> {
        let guest = self.guest.as_mut().ok_or(DbgError::NotConnected)?;
        let new_regs = guest.read_registers()?;
        self.prev_regs = std::mem::replace(&mut self.regs, new_regs);
        self.update_page_info();
        Ok(())
    }

    fn update_page_info(&mut self) {
        let previous = self.page_info.take();
        let next = self.current_inspect_va().map(|va| {
            match self.guest.as_mut().map(|g| g.inspect_va(va)) {
                Some(Ok(walk)) => PageInfo::Walk {
                    perm: walk.flags.as_ref().map(perm_from_flags),
                    walk,
                },
                Some(Err(e)) => PageInfo::Error(e.to_string()),
                None => PageInfo::Error(DbgError::NotConnected.to_string()),
            }
        });
        self.prev_page_info = previous;
        self.page_info = next;
    }
}

#[cfg(test)]
mod tests {
    use super::{format_dump_lines, perm_from_flags, InspectMode, PageInfo, Session};
    use crate::target::PteFlags;
    use crate::{BackendParams, ExecState};

    #[test]
    fn perm_strings() {
        // writable, user, executable
        let flags = PteFlags::from_entry(0x67);
        assert_eq!(perm_from_flags(&flags), "RWX (user)");
        // read-only, supervisor, nx (writable and user clear, bit 63 set)
        let flags = PteFlags::from_entry((1 << 63) | 0x61);
        assert_eq!(perm_from_flags(&flags), "R-- (kernel)");
        // not present
        let flags = PteFlags::from_entry(0);
        assert_eq!(perm_from_flags(&flags), "no permission");
    }

    #[test]
    fn dump_lines_are_fixed_width() {
        let data: Vec<u8> = (0..24).map(|i| 0x41 + (i % 4)).collect();
        let lines = format_dump_lines(0x1000, &data);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0x0000000000001000: 41 42 43 44 41 42 43 44 41 42 43 44 41 42 43 44  ABCDABCDABCDABCD"
        );
        // second row: 8 bytes, hex field still padded to 47 columns
        assert!(lines[1].starts_with("0x0000000000001010: "));
        let hex_field = &lines[1]["0x0000000000001010: ".len()..];
        let (hexpart, asciipart) = hex_field.split_at(47 + 2);
        assert_eq!(hexpart.trim_end().len(), 8 * 3 - 1);
        assert_eq!(asciipart, "ABCDABCD");
    }

    #[test]
    fn dump_maps_non_printable_to_dots() {
        let lines = format_dump_lines(0, &[0x00, 0x1f, 0x20, 0x7e, 0x7f, 0xff]);
        assert!(lines[0].ends_with("  .. ~.."));
    }

    #[test]
    fn fresh_session_has_no_inspect_va() {
        let session = Session::new(BackendParams::default());
        assert_eq!(session.state(), ExecState::Disconnected);
        assert_eq!(session.inspect_mode(), InspectMode::FollowRip);
        // rip is N/A before the first snapshot
        assert_eq!(session.current_inspect_va(), None);
        assert!(session.page_info().is_none());
    }

    #[test]
    fn manual_inspect_without_backend_yields_error_marker() {
        let mut session = Session::new(BackendParams::default());
        session.set_inspect_va(0xdead_b000);
        assert_eq!(session.current_inspect_va(), Some(0xdead_b000));
        match session.page_info() {
            Some(PageInfo::Error(msg)) => assert!(msg.contains("not connected")),
            other => panic!("unexpected page info {other:?}"),
        }
    }
}
