//! Argument lists for each external program.

use crate::types::{ExternalTool, RetrievalTask};
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Everything an argument list can be built from
pub(crate) struct Invocation<'a> {
    /// Effective location (mirror-rewritten URL, repository address or accession)
    pub location: &'a str,
    /// Destination file or directory
    pub dest: &'a Path,
    /// Task carrying extra args, thread count and archive credentials
    pub task: &'a RetrievalTask,
    /// Size ceiling handed to the sequencing-archive client
    pub prefetch_max_size: &'a str,
}

/// Build the argument list for `tool`
pub(crate) fn build(tool: ExternalTool, inv: &Invocation<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let extra = inv.task.extra_args.iter().map(os);

    match tool {
        ExternalTool::Wget => {
            args.extend([os("-c"), os(inv.location), os("-O"), os(inv.dest)]);
            args.extend(extra);
        }
        ExternalTool::Curl => {
            args.extend([os(inv.location), os("-o"), os(inv.dest)]);
            args.extend(extra);
        }
        ExternalTool::Axel => {
            args.extend([
                os(inv.location),
                os("-N"),
                os("-o"),
                os(inv.dest),
                os("-n"),
                os(inv.task.axel_threads.to_string()),
            ]);
            args.extend(extra);
        }
        ExternalTool::Git => {
            args.extend([os("clone"), os("--recursive")]);
            args.extend(extra);
            args.extend([os(inv.location), os(inv.dest)]);
        }
        ExternalTool::Rsync => {
            args.extend([os(inv.location), os(inv.dest)]);
            args.extend(extra);
        }
        ExternalTool::GdcClient => {
            args.push(os("download"));
            match &inv.task.gdc_manifest {
                Some(manifest) => args.extend([os("-m"), os(manifest)]),
                None => args.push(os(inv.location)),
            }
            args.extend([os("-d"), os(output_dir(inv.dest))]);
            args.extend(extra);
            if let Some(token) = inv.task.gdc_token.as_deref().filter(|t| !t.is_empty()) {
                args.extend([os("-t"), os(token)]);
            }
        }
        ExternalTool::Prefetch => {
            args.extend([
                os("-O"),
                os(output_dir(inv.dest)),
                os("-X"),
                os(inv.prefetch_max_size),
            ]);
            args.extend(extra);
            match &inv.task.prefetch_key {
                Some(key) => args.push(os(key)),
                None => args.push(os(inv.location)),
            }
        }
    }
    args
}

fn os(arg: impl AsRef<OsStr>) -> OsString {
    arg.as_ref().to_os_string()
}

/// Archive clients write into a directory rather than to a named file
fn output_dir(dest: &Path) -> &Path {
    dest.parent().unwrap_or(dest)
}
