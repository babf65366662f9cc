//! Pipeline execution: pipe wiring, stage workers, error collection.

use std::fs::File;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::command::{RunError, Stage, Stream};
use crate::history::History;
use crate::posix;

/// Run a parsed pipeline to completion. Does not return until every
/// stage has terminated and released its handles, so the prompt loop
/// never reads the next line mid-pipeline.
pub fn execute(stages: Vec<Stage>, history: &Arc<History>) {
    let mut stages = stages;
    match stages.len() {
        0 => {}
        1 => execute_single(stages.remove(0), history),
        _ => execute_pipeline(stages, history),
    }
}

/// The common case: one stage, run on the prompt thread.
fn execute_single(mut stage: Stage, history: &Arc<History>) {
    if let Err(err) = stage.setup_redirection() {
        stage.write_stderr(&format!("{err}\n"));
        return;
    }
    match stage.run(history) {
        Ok(()) => {}
        // the child already reported on its own stderr
        Err(RunError::ChildExit(_)) => {}
        Err(err) => stage.write_stderr(&format!("{err}\n")),
    }
}

fn execute_pipeline(mut stages: Vec<Stage>, history: &Arc<History>) {
    let count = stages.len();

    let dev_null = match posix::dev_null() {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to open null sink: {err}");
            return;
        }
    };

    // readers[i] feeds stage i's stdin; writers[i] carries stage i's
    // stdout. Creation failure drops whatever was already made.
    let mut readers: Vec<Option<File>> = (0..count).map(|_| None).collect();
    let mut writers: Vec<Option<File>> = (0..count).map(|_| None).collect();
    for i in 0..count - 1 {
        match posix::pipe() {
            Ok((read_end, write_end)) => {
                readers[i + 1] = Some(read_end);
                writers[i] = Some(write_end);
            }
            Err(err) => {
                eprintln!("failed to create pipeline: {err}");
                return;
            }
        }
    }

    let builtin_next: Vec<bool> = (0..count)
        .map(|i| i + 1 < count && stages[i + 1].is_builtin())
        .collect();

    for (i, stage) in stages.iter_mut().enumerate() {
        if let Some(read_end) = readers[i].take() {
            stage.stdin = Stream::Handle(read_end);
        }

        if stage.redirects_stdout() {
            // the stdout redirection claims this stage's output; the
            // write end closes now so downstream sees EOF
            writers[i].take();
        } else if i < count - 1 {
            if builtin_next[i] {
                // builtins never read their stdin; sink the output so
                // this stage cannot block on a pipe nobody drains
                match dev_null.try_clone() {
                    Ok(sink) => stage.stdout = Stream::Handle(sink),
                    Err(err) => {
                        eprintln!("failed to clone null sink: {err}");
                        return;
                    }
                }
                writers[i].take();
            } else if let Some(write_end) = writers[i].take() {
                stage.stdout = Stream::Handle(write_end);
            }
        }
        // the last stage keeps its inherited (or redirected) stdout
    }

    let cancelled = Arc::new(AtomicBool::new(false));
    let (err_tx, err_rx) = mpsc::sync_channel::<(RunError, Stream)>(count);

    let mut workers = Vec::with_capacity(count);
    for mut stage in stages {
        let history = Arc::clone(history);
        let cancelled = Arc::clone(&cancelled);
        let err_tx = err_tx.clone();
        workers.push(thread::spawn(move || {
            // dropping the stage at any exit releases its pipe ends and
            // redirection files, which is what unblocks the neighbours
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            if let Err(err) = stage.setup_redirection() {
                stage.write_stderr(&format!("{err}\n"));
                return;
            }
            if let Err(err) = stage.run(&history) {
                if err.is_broken_pipe() && stage.is_builtin() {
                    // downstream closed early; normal for a builtin
                    return;
                }
                cancelled.store(true, Ordering::SeqCst);
                let _ = err_tx.send((err, stage.stderr.take()));
            }
        }));
    }
    drop(err_tx);

    for worker in workers {
        let _ = worker.join();
    }

    for (err, mut stderr) in err_rx {
        if matches!(err, RunError::ChildExit(_)) {
            continue;
        }
        report(&mut stderr, &err);
    }
}

fn report(stderr: &mut Stream, err: &RunError) {
    let message = format!("{err}\n");
    let _ = match stderr {
        Stream::Inherit => io::stderr().lock().write_all(message.as_bytes()),
        Stream::Handle(file) => file.write_all(message.as_bytes()),
    };
}
