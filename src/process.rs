//! Live-process access via ptrace
//!
//! One attach per run: the target is stopped for the whole walk and
//! detached (and thereby resumed) when the handle drops. Remote memory is
//! read with `process_vm_readv`, registers with `PTRACE_GETREGS`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, IoSliceMut};
use std::path::Path;

use anyhow::{Context, Result};
use nix::sys::ptrace;
use nix::sys::uio::{process_vm_readv, RemoteIoVec};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use tracing::debug;

use crate::context::{FrameInfo, MemoryContext, RawVariable};
use crate::dwarf::DebugInfo;

/// Maximum frames the preliminary chain walk will count.
const MAX_STACK_DEPTH: usize = 64;

/// A process stopped under ptrace, detached again on drop.
pub struct PtraceTarget {
    pid: Pid,
    debug_info: Option<DebugInfo>,
    load_bias: u64,
}

impl PtraceTarget {
    /// Attach to `pid`, wait for the stop, and load the target's debug
    /// info.
    ///
    /// Missing or unreadable debug info degrades the output (unknown
    /// function names, no variables) instead of failing the attach.
    pub fn attach(pid: libc::pid_t) -> Result<Self> {
        let pid = Pid::from_raw(pid);
        ptrace::attach(pid).with_context(|| format!("Failed to attach to PID {pid}"))?;
        waitpid(pid, None).context("Failed to wait for attach stop")?;
        eprintln!("[stackscope: attached to process {pid}]");

        let mut target = Self {
            pid,
            debug_info: None,
            load_bias: 0,
        };
        if let Err(err) = target.load_debug_info() {
            eprintln!("[stackscope: no debug info: {err:#}]");
            eprintln!("[stackscope: continuing without symbols or variables]");
        }
        Ok(target)
    }

    fn load_debug_info(&mut self) -> Result<()> {
        let exe = fs::read_link(format!("/proc/{}/exe", self.pid))
            .context("Failed to resolve /proc/PID/exe")?;
        let info = DebugInfo::load(&exe)?;
        if info.is_position_independent() {
            self.load_bias = module_base(self.pid, &exe)?;
            debug!("load bias for {}: {:#x}", exe.display(), self.load_bias);
        }
        self.debug_info = Some(info);
        Ok(())
    }

    /// The address as the binary's DWARF sees it: load bias removed for
    /// position-independent executables.
    fn link_address(&self, address: u64) -> u64 {
        if address >= self.load_bias {
            address - self.load_bias
        } else {
            address
        }
    }

    fn read_bytes(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
        let len = buffer.len();
        let mut local = [IoSliceMut::new(buffer)];
        let remote = [RemoteIoVec {
            base: address as usize,
            len,
        }];
        let read = process_vm_readv(self.pid, &mut local, &remote)
            .with_context(|| format!("Failed to read memory at {address:#x}"))?;
        if read < len {
            anyhow::bail!("Short read at {address:#x}: {read} of {len} bytes");
        }
        Ok(())
    }

    /// Read and format a variable's live value, if its width maps to a
    /// scalar.
    fn read_value(&self, address: u64, size: u64) -> Option<String> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return None;
        }
        let mut buffer = [0u8; 8];
        let slice = &mut buffer[..size as usize];
        self.read_bytes(address, slice).ok()?;
        format_scalar(slice)
    }
}

impl MemoryContext for PtraceTarget {
    fn read_pointer(&self, address: u64) -> Result<u64> {
        let mut buffer = [0u8; 8];
        self.read_bytes(address, &mut buffer)?;
        Ok(u64::from_ne_bytes(buffer))
    }

    fn thread_frames(&self) -> Result<Vec<FrameInfo>> {
        let regs = ptrace::getregs(self.pid).context("Failed to read registers")?;

        let mut frames = Vec::with_capacity(16);
        frames.push(FrameInfo {
            pc: regs.rip,
            base: regs.rbp,
            stack: regs.rsp,
        });

        // Preliminary walk to size the frame list. The renderer's walk
        // re-reads the linkage as it goes; this one only counts levels.
        let mut rbp = regs.rbp;
        while frames.len() < MAX_STACK_DEPTH {
            if rbp == 0 {
                break;
            }
            let Ok(saved_base) = self.read_pointer(rbp) else {
                break;
            };
            let Ok(return_address) = self.read_pointer(rbp + 8) else {
                break;
            };
            if saved_base == 0 {
                break;
            }
            // A well-formed chain climbs toward higher addresses.
            if saved_base <= rbp {
                debug!("frame chain not increasing at {rbp:#x}; stopping");
                break;
            }
            frames.push(FrameInfo {
                pc: return_address,
                base: saved_base,
                stack: rbp + 16,
            });
            rbp = saved_base;
        }
        Ok(frames)
    }

    fn resolve_symbol(&self, address: u64) -> Option<String> {
        let info = self.debug_info.as_ref()?;
        info.function_name(self.link_address(address))
    }

    fn frame_variables(&self, frame: &FrameInfo) -> Vec<RawVariable> {
        let Some(info) = self.debug_info.as_ref() else {
            return Vec::new();
        };
        let sites = match info.variables_at(self.link_address(frame.pc), frame.base) {
            Ok(sites) => sites,
            Err(err) => {
                debug!("variable lookup failed at pc {:#x}: {err:#}", frame.pc);
                return Vec::new();
            }
        };
        sites
            .into_iter()
            .map(|site| {
                let value = site
                    .address
                    .and_then(|address| self.read_value(address, site.size));
                RawVariable {
                    name: site.name,
                    address: site.address,
                    size: site.size,
                    value,
                }
            })
            .collect()
    }
}

impl Drop for PtraceTarget {
    fn drop(&mut self) {
        if let Err(err) = ptrace::detach(self.pid, None) {
            eprintln!("[stackscope: failed to detach from {}: {err}]", self.pid);
        }
    }
}

/// Format a little-endian scalar by width: hex for pointer-width values,
/// signed decimal below that.
fn format_scalar(bytes: &[u8]) -> Option<String> {
    Some(match bytes.len() {
        1 => (bytes[0] as i8).to_string(),
        2 => i16::from_ne_bytes(bytes.try_into().ok()?).to_string(),
        4 => i32::from_ne_bytes(bytes.try_into().ok()?).to_string(),
        8 => format!("{:#018x}", u64::from_ne_bytes(bytes.try_into().ok()?)),
        _ => return None,
    })
}

/// Find the base address the executable is mapped at by scanning
/// `/proc/PID/maps` for its first offset-zero mapping.
fn module_base(pid: Pid, exe: &Path) -> Result<u64> {
    let maps_path = format!("/proc/{pid}/maps");
    let file =
        File::open(&maps_path).with_context(|| format!("Failed to open {maps_path}"))?;
    find_module_base(BufReader::new(file), &exe.to_string_lossy())
        .with_context(|| format!("No mapping of {} found in {maps_path}", exe.display()))
}

fn find_module_base<R: BufRead>(reader: R, exe_path: &str) -> Option<u64> {
    for line in reader.lines() {
        let line = line.ok()?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            continue;
        }
        // range perms offset dev inode pathname...
        let pathname = parts[5..].join(" ");
        if parts[2] != "00000000" || pathname != exe_path {
            continue;
        }
        let start = parts[0].split('-').next()?;
        return u64::from_str_radix(start, 16).ok();
    }
    None
}
