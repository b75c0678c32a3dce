use crate::conn::{AmClientCore, CancelHandle};
use crate::protocol::{attributes, Record, ResultClass, StreamKind};
use crate::target::memory::decode_contents;
use crate::target::registers::{RegisterMap, RegisterSnapshot};
use crate::target::walk::{walk_va, PhysSource, WalkResult};
use crate::util::{parse_hex_u64, parse_u64_auto};
use crate::{BackendParams, DbgError, DbgResult};
use regex::Regex;
use std::collections::HashMap;

/// Ordered patterns for extracting CR3 from monitor text; the first match
/// wins. The hypervisor's wording varies between versions, which is why the
/// patterns are data and not code: extend the list to support another
/// flavor. All capture groups are hex digits, with or without `0x`, and may
/// contain `_` separators.
pub const CR3_PATTERNS: [&str; 4] = [
    r"CR3\s*=\s*(0x[0-9a-fA-F_]+)",
    r"CR3\s*=\s*([0-9a-fA-F_]+)",
    r"PDBR\s*=\s*(0x[0-9a-fA-F_]+)",
    r"PDBR\s*=\s*([0-9a-fA-F_]+)",
];

lazy_static! {
    static ref CR3_REGEXES: Vec<Regex> = CR3_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("CR3 pattern"))
        .collect();
    static ref XP_VALUE_RE: Regex = Regex::new(r":\s*0x([0-9a-fA-F]+)").expect("xp pattern");
    static ref NUMBER_VALUE_RE: Regex =
        Regex::new(r#"number="(\d+)",value="([^"]*)""#).expect("register-values pattern");
}

/// Extracts CR3 from the text of `monitor info cr3` (or a register dump).
pub fn parse_cr3_text(text: &str) -> DbgResult<u64> {
    let trimmed = text.trim();
    for re in CR3_REGEXES.iter() {
        if let Some(cap) = re.captures(trimmed) {
            if let Some(value) = parse_hex_u64(&cap[1]) {
                return Ok(value);
            }
        }
    }
    Err(DbgError::Cr3Unavailable {
        raw: trimmed.to_string(),
    })
}

/// Extracts the qword from the first line of `monitor xp /1gx` output,
/// e.g. `0000000000001000: 0x0000000000002003`.
pub fn parse_xp_text(text: &str) -> DbgResult<u64> {
    let first_line = text.trim().lines().next().unwrap_or("");
    match XP_VALUE_RE.captures(first_line) {
        Some(cap) => u64::from_str_radix(&cap[1], 16).map_err(|_| DbgError::ParsePhys {
            raw: first_line.to_string(),
        }),
        None => Err(DbgError::ParsePhys {
            raw: first_line.to_string(),
        }),
    }
}

/// High-level operations on the paused guest: registers, physical and
/// virtual memory, execution control, and the page-table walk.
///
/// All backend traffic is serialized through the shared protocol client;
/// the register map is populated in [`Guest::connect`] and read-only
/// afterwards.
#[derive(Debug)]
pub struct Guest {
    core: AmClientCore,
    params: BackendParams,
    registers: RegisterMap,
}

impl Guest {
    /// Spawns and bootstraps the backend, then enumerates register names.
    pub fn connect(params: BackendParams) -> DbgResult<Self> {
        let core = AmClientCore::try_new(params.clone())?;
        let exchange = core.send("-data-list-register-names", params.reply_timeout())?;
        exchange.assert_class(ResultClass::Done)?;
        let names = attributes::string_list(&exchange.result.attributes, "register-names")?
            .ok_or_else(|| DbgError::Decode {
                reason: "register-names missing from result record".to_string(),
            })?;
        let registers = RegisterMap::from_names(names);
        debug!("register map holds {} names", registers.len());
        Ok(Self {
            core,
            params,
            registers,
        })
    }

    /// The name↔index map reported by the backend.
    pub fn registers(&self) -> &RegisterMap {
        &self.registers
    }

    /// The backend index of a register name.
    pub fn register_number(&self, name: &str) -> DbgResult<usize> {
        self.registers
            .number_of(name)
            .ok_or_else(|| DbgError::RegisterUnknown {
                name: name.to_string(),
            })
    }

    /// Reads all register values (hex format) into a canonical snapshot.
    pub fn read_registers(&self) -> DbgResult<RegisterSnapshot> {
        let exchange = self
            .core
            .send("-data-list-register-values x", self.params.reply_timeout())?;
        exchange.assert_class(ResultClass::Done)?;
        let mut by_number = HashMap::new();
        for cap in NUMBER_VALUE_RE.captures_iter(&exchange.result.attributes) {
            if let Ok(number) = cap[1].parse::<usize>() {
                by_number.insert(number, cap[2].to_string());
            }
        }
        Ok(RegisterSnapshot::from_values(&self.registers, &by_number))
    }

    /// Reads CR3, preferring the register map, falling back to the monitor.
    ///
    /// Stock gdb builds do not expose CR3 as a register on the reference
    /// backend, so the monitor path is the common one.
    pub fn read_cr3(&self) -> DbgResult<u64> {
        match self.register_number("cr3") {
            Ok(number) => {
                let exchange = self.core.send(
                    &format!("-data-list-register-values x {number}"),
                    self.params.reply_timeout(),
                )?;
                if let Some(value) =
                    attributes::quoted_value(&exchange.result.attributes, "value")?
                {
                    if let Ok(cr3) = parse_u64_auto(&value) {
                        return Ok(cr3);
                    }
                }
                debug!("cr3 register value unusable, falling back to monitor");
            }
            Err(_) => trace!("cr3 not in register map, using monitor"),
        }
        let text = self
            .core
            .monitor("info cr3", self.params.monitor_timeout())?;
        parse_cr3_text(&text)
    }

    /// Reads one little-endian qword of guest-physical memory through the
    /// monitor.
    pub fn read_phys_qword(&self, phys_addr: u64) -> DbgResult<u64> {
        let exchange = self.core.send(
            &format!("-interpreter-exec console \"monitor xp /1gx {phys_addr:#x}\""),
            self.params.reply_timeout(),
        )?;
        let saw_stream = exchange.records.iter().any(|r| {
            matches!(
                r,
                Record::Stream {
                    kind: StreamKind::Console | StreamKind::Target,
                    ..
                }
            )
        });
        if !saw_stream {
            return Err(DbgError::MonitorNoOutput);
        }
        parse_xp_text(&exchange.console_text())
    }

    /// Reads `size` bytes of guest-virtual memory.
    pub fn read_virt_bytes(&self, va: u64, size: usize) -> DbgResult<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let exchange = self.core.send(
            &format!("-data-read-memory-bytes {va:#x} {size}"),
            self.params.reply_timeout(),
        )?;
        exchange.assert_class(ResultClass::Done)?;
        let attrs = &exchange.result.attributes;
        match attributes::quoted_value(attrs, "contents")? {
            Some(contents) => Ok(decode_contents(&contents, size)),
            None => Err(DbgError::ParseBytes { raw: attrs.clone() }),
        }
    }

    /// One machine instruction forward.
    pub fn step_instruction(&self) -> DbgResult<()> {
        self.core
            .send("-exec-step-instruction", self.params.reply_timeout())?;
        Ok(())
    }

    /// Resumes the guest; returns as soon as the backend acknowledges with
    /// the `running` class, without waiting for the next stop.
    pub fn continue_execution(&self) -> DbgResult<()> {
        self.core
            .send("-exec-continue", self.params.reply_timeout())?;
        Ok(())
    }

    /// Interrupts the running guest (SIGINT to the backend).
    pub fn interrupt(&self) -> DbgResult<()> {
        self.core.signal_interrupt()
    }

    /// Translates `va` through the live page tables: reads CR3 and walks
    /// all levels. Nothing is cached between calls - the guest may have
    /// rebuilt its tables - so one call costs at most five physical reads
    /// plus the CR3 read.
    pub fn inspect_va(&mut self, va: u64) -> DbgResult<WalkResult> {
        let cr3 = self.read_cr3()?;
        walk_va(self, cr3, va)
    }

    /// Handle for aborting a blocked backend call.
    pub fn cancel_handle(&self) -> DbgResult<CancelHandle> {
        self.core.cancel_handle()
    }

    /// Whether the backend child is still owned and believed alive.
    pub fn is_connected(&self) -> bool {
        self.core.is_connected().unwrap_or(false)
    }

    /// Shuts the backend down; idempotent.
    pub fn close(&self) -> DbgResult<()> {
        self.core.close()
    }
}

impl PhysSource for Guest {
    fn read_qword(&mut self, phys_addr: u64) -> DbgResult<u64> {
        self.read_phys_qword(phys_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_cr3_text, parse_xp_text};
    use crate::DbgError;

    #[test]
    fn cr3_patterns_in_order() {
        assert_eq!(parse_cr3_text("CR3 = 0x1234abcd\n").unwrap(), 0x1234_abcd);
        assert_eq!(parse_cr3_text("CR3 = 0x1234_abcd\n").unwrap(), 0x1234_abcd);
        assert_eq!(parse_cr3_text("CR3=185000").unwrap(), 0x185000);
        assert_eq!(parse_cr3_text("PDBR = 0xdeadbeef").unwrap(), 0xdead_beef);
        assert_eq!(parse_cr3_text("PDBR = deadbeef").unwrap(), 0xdead_beef);
    }

    #[test]
    fn cr3_no_match() {
        assert!(matches!(
            parse_cr3_text("no match here"),
            Err(DbgError::Cr3Unavailable { .. })
        ));
        assert!(matches!(
            parse_cr3_text(""),
            Err(DbgError::Cr3Unavailable { .. })
        ));
    }

    #[test]
    fn xp_first_value() {
        assert_eq!(
            parse_xp_text("0000000000001000: 0x0000000000002003\n").unwrap(),
            0x2003
        );
        assert!(matches!(
            parse_xp_text("Cannot access memory"),
            Err(DbgError::ParsePhys { .. })
        ));
    }
}
