use anyhow::Result;
use dstask_app::{GitTaskLog, TaskWriter, VersionedLog};

pub fn run_sync<L: VersionedLog>(writer: &TaskWriter<L>) -> Result<()> {
    let output = writer.sync()?;
    if !output.is_empty() {
        println!("{output}");
    }
    println!("Successfully synchronised task repository");
    Ok(())
}

pub fn run_undo<L: VersionedLog>(writer: &TaskWriter<L>) -> Result<()> {
    let reverted = writer.undo()?;
    println!("Undid change {reverted}");
    Ok(())
}

pub fn run_git(log: &GitTaskLog, args: &[String]) -> Result<()> {
    log.git().passthrough(args)?;
    Ok(())
}
