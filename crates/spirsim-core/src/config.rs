//! Diagnostic output configuration
//!
//! Hosts can ask for memory dumps after each work-group and after each
//! kernel, and for instruction tracing, through environment variables. A
//! variable enables its output only when set to exactly `1`.
//!
//! | Variable                      | Output                                  |
//! |-------------------------------|-----------------------------------------|
//! | `SPIRSIM_OUTPUT_PRIVATE_MEM`  | private memories after each work-group  |
//! | `SPIRSIM_OUTPUT_LOCAL_MEM`    | local memory after each work-group      |
//! | `SPIRSIM_OUTPUT_GLOBAL_MEM`   | global memory after the kernel          |
//! | `SPIRSIM_OUTPUT_INSTRUCTIONS` | instruction trace (read by interpreters)|

use crate::memory::Memory;
use std::env;
use std::io::{self, Write};

const SEPARATOR: &str = "================================================================";

/// Which diagnostic outputs are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputMask {
    pub private_mem: bool,
    pub local_mem: bool,
    pub global_mem: bool,
    pub instructions: bool,
}

impl OutputMask {
    /// Whether anything is printed per work-group.
    pub fn per_work_group(&self) -> bool {
        self.private_mem || self.local_mem || self.instructions
    }
}

/// Diagnostic settings for a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    pub output: OutputMask,
}

fn enabled(name: &str) -> bool {
    env::var(name).is_ok_and(|value| value == "1")
}

impl DiagnosticsConfig {
    /// Read the `SPIRSIM_OUTPUT_*` variables.
    pub fn from_env() -> Self {
        Self {
            output: OutputMask {
                private_mem: enabled("SPIRSIM_OUTPUT_PRIVATE_MEM"),
                local_mem: enabled("SPIRSIM_OUTPUT_LOCAL_MEM"),
                global_mem: enabled("SPIRSIM_OUTPUT_GLOBAL_MEM"),
                instructions: enabled("SPIRSIM_OUTPUT_INSTRUCTIONS"),
            },
        }
    }

    /// Banner written before a work-group runs, when per-group output is on.
    pub fn work_group_banner(&self, out: &mut dyn Write, group_id: [u64; 3]) -> io::Result<()> {
        if !self.output.per_work_group() {
            return Ok(());
        }
        writeln!(out)?;
        writeln!(out, "{SEPARATOR}")?;
        writeln!(out, "Work-group ({},{},{})", group_id[0], group_id[1], group_id[2])?;
        writeln!(out, "{SEPARATOR}")
    }

    /// Dump the finished work-group's private and local memories.
    pub fn dump_after_work_group(&self, out: &mut dyn Write, private: &[&Memory], local: &Memory) -> io::Result<()> {
        if self.output.private_mem {
            for memory in private {
                memory.dump_to(out)?;
            }
        }
        if self.output.local_mem {
            local.dump_to(out)?;
        }
        Ok(())
    }

    /// Dump global memory once the kernel has finished.
    pub fn dump_after_kernel(&self, out: &mut dyn Write, global: &Memory) -> io::Result<()> {
        if !self.output.global_mem {
            return Ok(());
        }
        writeln!(out)?;
        writeln!(out, "{SEPARATOR}")?;
        global.dump_to(out)?;
        writeln!(out, "{SEPARATOR}")
    }
}
