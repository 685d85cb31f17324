// Own test binary: it lowers RLIMIT_NOFILE for the whole process.
use std::collections::BTreeSet;

use dsh::builtin::BuiltinSet;
use dsh::error::ExecError;
use dsh::exec::{spawn_pipeline, ExecContext, IoBindings};
use dsh::parse::build_pipeline;
use nix::errno::Errno;

fn open_fds() -> BTreeSet<i32> {
    std::fs::read_dir("/proc/self/fd").expect("procfs")
        .filter_map(|e| e.ok()?.file_name().to_str()?.parse().ok())
        .collect()
}

fn get_nofile() -> libc::rlimit {
    let mut rl = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) }, 0);
    rl
}

fn set_nofile(rl: &libc::rlimit) {
    assert_eq!(unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, rl) }, 0);
}

#[test]
fn pipe_exhaustion_closes_what_was_created() {
    let parsed = build_pipeline(&vec!["cat"; 8].join(" | ")).expect("parse");
    let mut ctx = ExecContext::new(BuiltinSet::Local);
    let before = open_fds();

    // leave room for four descriptors (two pipes); eight stages need fourteen
    let mut free = 0;
    let mut limit = 0;
    while free < 4 {
        if !before.contains(&limit) { free += 1; }
        limit += 1;
    }
    let saved = get_nofile();
    set_nofile(&libc::rlimit { rlim_cur: limit as libc::rlim_t, rlim_max: saved.rlim_max });
    let result = spawn_pipeline(&parsed.pipeline, &IoBindings::Terminal, &mut ctx);
    set_nofile(&saved);

    assert!(matches!(result, Err(ExecError::PipeCreateFailed(Errno::EMFILE))), "{result:?}");
    assert_eq!(open_fds(), before);
    assert_eq!(ctx.last_code, 0);
}
