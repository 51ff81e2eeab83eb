// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Copies a file through the platform fallback ladder, then repeats the copy
//! with `overwrite` so the second attempt doesn't fail with `AlreadyExists`.

use iofs::{CopyOptions, Executor, ExecutorConfig, Path, Root};

#[tokio::main]
async fn main() -> iofs::Result<()> {
    tracing_subscriber::fmt::init();

    let tmp = tempfile::tempdir().expect("create a scratch directory");
    let executor = Executor::new(ExecutorConfig::new());
    let dir = Root::bind(tmp.path(), executor).await?;

    let payload = vec![0xAB_u8; 4 * 1024 * 1024];
    dir.write(&Path::new("source.bin")?, payload).await?;

    let src = Path::new("source.bin")?;
    let dst = Path::new("copy.bin")?;

    dir.copy(&src, &dir, &dst, CopyOptions::new().copy_attributes(true)).await?;
    println!("copied source.bin -> copy.bin");

    match dir.copy(&src, &dir, &dst, CopyOptions::new()).await {
        Err(iofs::Error::AlreadyExists) => println!("second copy correctly rejected: copy.bin already exists"),
        other => other?,
    }

    dir.copy(&src, &dir, &dst, CopyOptions::new().overwrite(true)).await?;
    println!("second copy succeeded with overwrite(true)");

    Ok(())
}
