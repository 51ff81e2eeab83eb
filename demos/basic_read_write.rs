// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Binds a directory, writes a file both plainly and atomically, then reads
//! it back and narrows the capability into a subdirectory.

use iofs::{AtomicWriteOptions, Durability, Executor, ExecutorConfig, OpenOptions, Path, Root};

#[tokio::main]
async fn main() -> iofs::Result<()> {
    tracing_subscriber::fmt::init();

    let tmp = tempfile::tempdir().expect("create a scratch directory");
    let executor = Executor::new(ExecutorConfig::new());
    let dir = Root::bind(tmp.path(), executor.clone()).await?;

    dir.write(&Path::new("greeting.txt")?, b"hello from iofs".to_vec()).await?;
    println!("wrote greeting.txt");

    dir.write_atomic(
        &Path::new("config.toml")?,
        b"mode = \"production\"\n".to_vec(),
        AtomicWriteOptions::new().durability(Durability::Full),
    )
    .await?;
    println!("wrote config.toml atomically");

    let text = dir.read_to_string(&Path::new("greeting.txt")?).await?;
    println!("greeting.txt contains: {text}");

    let handle = dir.open(&Path::new("config.toml")?, OpenOptions::new().read(true)).await?;
    let id = executor.register_handle(handle)?;
    let first_bytes = executor.with_handle(id, |h| h.read(9)).await?;
    println!("config.toml starts with: {}", String::from_utf8_lossy(&first_bytes));
    executor.destroy_handle(id).await?;

    dir.create_dir(&Path::new("logs")?).await?;
    let logs = dir.open_dir(&Path::new("logs")?).await?;
    logs.write(&Path::new("today.log")?, b"started up\n".to_vec()).await?;
    println!("wrote logs/today.log through the narrowed capability");

    Ok(())
}
