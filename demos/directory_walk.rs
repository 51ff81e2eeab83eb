// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Seeds a small nested tree, then drains it with both the flat, batched
//! `read_dir` and the recursive `walk`.

use iofs::{Executor, ExecutorConfig, Path, ReadDirOptions, Root, WalkOptions};

#[tokio::main]
async fn main() -> iofs::Result<()> {
    tracing_subscriber::fmt::init();

    let tmp = tempfile::tempdir().expect("create a scratch directory");
    let executor = Executor::new(ExecutorConfig::new());
    let dir = Root::bind(tmp.path(), executor).await?;

    dir.create_dir_all(&Path::new("reports/2026/07")?).await?;
    for i in 0..5 {
        dir.write(&Path::new(format!("reports/2026/07/day-{i}.txt"))?, b"data".to_vec())
            .await?;
    }
    dir.write(&Path::new("README.txt")?, b"top level file".to_vec()).await?;

    println!("-- flat read_dir over the top level --");
    let mut top = dir.read_dir(&Path::new(".")?, ReadDirOptions::new().batch_size(2)).await?;
    while let Some(entry) = top.next().await? {
        println!("{}", entry.file_name().to_string_lossy());
    }

    println!("-- recursive walk --");
    let mut walk = dir.walk(&Path::new(".")?, WalkOptions::new().max_concurrency(2)).await?;
    let mut count = 0;
    while let Some(path) = walk.next().await? {
        println!("{}", path.display());
        count += 1;
    }
    println!("visited {count} entries");

    Ok(())
}
