//! blobstream: stream a local file through a chunked blob upload.
//!
//! The file is uploaded into an in-memory blob service, which makes the
//! tool useful for exercising chunking, concurrency and checksum options.

use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use blobstream::models::align_up;
use blobstream::{Args, BlockBlobClient, MemoryBlobStore, PageBlobClient, UploadOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug {
        Level::DEBUG
    } else if args.silent {
        Level::ERROR
    } else {
        Level::INFO
    };

    // RUST_LOG directives refine the level chosen on the command line
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let options = UploadOptions::from(&args);
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "blob".to_string());

    let file = tokio::fs::File::open(&args.file).await?;
    let file_len = file.metadata().await?.len();

    let store = Arc::new(MemoryBlobStore::new());
    let blob = Arc::new(store.blob(&name));
    let started = Instant::now();

    let properties = if args.page_blob {
        // Page blobs hold whole pages; pad the tail with zeros.
        let length = align_up(file_len);
        let padded = file.chain(tokio::io::repeat(0).take(length - file_len));
        PageBlobClient::new(blob)
            .upload_from_reader(padded, length, options)
            .await?
    } else {
        BlockBlobClient::new(blob)
            .upload_from_reader(file, options)
            .await?
    };
    let elapsed = started.elapsed();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&properties)?);
    } else {
        let blocks = store
            .committed_block_list(&name)
            .map(|ids| ids.len())
            .unwrap_or(0);
        println!(
            r#"
Uploaded {} as {}

Length:       {} bytes
Blocks:       {}
Content-MD5:  {}
Elapsed:      {:.3}s
"#,
            name,
            properties.blob_type.as_str(),
            properties.content_length,
            blocks,
            properties.content_md5.as_deref().unwrap_or("-"),
            elapsed.as_secs_f64()
        );
    }

    if let Some(output) = &args.output {
        store.save_to(&name, output).await?;
    }

    Ok(())
}
