//! The write pipeline: resolve options, prepare the file, create its parent,
//! write its contents.

use std::path::PathBuf;
use std::sync::Arc;

use metadata::DescriptorOps;
use platform::Capabilities;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use vfile::VirtualFile;

use crate::contents::write_contents;
use crate::debug_write::trace_write_complete;
use crate::descriptor::WriteContext;
use crate::error::{WriteError, WriteResult};
use crate::mkdir::ensure_dir;
use crate::options::{DestinationOptions, FileOption, WriteOptions};

/// Most files written at once.
///
/// Each in-flight write holds at most one descriptor, plus one more while a
/// directory is being reconciled.
const MAX_WRITERS: usize = 64;

const MIN_WRITERS: usize = 1;

/// Writers per available core when nothing is configured.
const WRITERS_PER_CORE: usize = 2;

/// Environment variable overriding the default concurrency.
pub const MAX_CONCURRENT_ENV: &str = "VFDEST_MAX_CONCURRENT";

/// Default concurrency: [`MAX_CONCURRENT_ENV`] when it holds a number,
/// otherwise [`WRITERS_PER_CORE`] writers per available core.
fn default_concurrency() -> usize {
    let cores = std::thread::available_parallelism().ok().map(usize::from);
    concurrency_from(std::env::var(MAX_CONCURRENT_ENV).ok().as_deref(), cores)
}

fn concurrency_from(configured: Option<&str>, cores: Option<usize>) -> usize {
    configured
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or_else(|| cores.map_or(4, |cores| cores * WRITERS_PER_CORE))
        .clamp(MIN_WRITERS, MAX_WRITERS)
}

/// Writes [`VirtualFile`]s under an output folder.
///
/// For every file the destination resolves its [`DestinationOptions`],
/// re-roots the file under the output folder, creates the parent directory
/// and writes the contents. The returned file's `stat` describes what ended up
/// on disk.
///
/// # Example
///
/// ```no_run
/// use engine::{Destination, DestinationOptions};
/// use vfile::VirtualFile;
///
/// # async fn example() -> Result<(), engine::WriteError> {
/// let destination = Destination::new("out")
///     .with_options(DestinationOptions::new().mode(0o644).overwrite(false));
/// let file = VirtualFile::new("docs/readme.txt").with_contents(b"hello".to_vec());
/// let written = destination.write(file).await?;
/// assert!(written.path().ends_with("out/docs/readme.txt"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Destination {
    out_folder: FileOption<PathBuf>,
    options: DestinationOptions,
    context: WriteContext,
    max_concurrent: usize,
}

impl Destination {
    /// Creates a destination writing under `out_folder`.
    ///
    /// A relative folder is resolved against the configured working
    /// directory.
    #[must_use]
    pub fn new(out_folder: impl Into<PathBuf>) -> Self {
        Self::with_out_folder(FileOption::Value(out_folder.into()))
    }

    /// Creates a destination whose output folder may depend on each file.
    #[must_use]
    pub fn with_out_folder(out_folder: FileOption<PathBuf>) -> Self {
        Self {
            out_folder,
            options: DestinationOptions::default(),
            context: WriteContext::default(),
            max_concurrent: default_concurrency(),
        }
    }

    /// Replaces the write options.
    #[must_use]
    pub fn with_options(mut self, options: DestinationOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the detected filesystem capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.context.capabilities = capabilities;
        self
    }

    /// Routes descriptor syscalls through `ops`.
    #[must_use]
    pub fn with_ops(mut self, ops: Arc<dyn DescriptorOps>) -> Self {
        self.context.ops = ops;
        self
    }

    /// Sets the maximum number of files written at once.
    ///
    /// Clamped to `[1, 64]`.
    #[must_use]
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.clamp(MIN_WRITERS, MAX_WRITERS);
        self
    }

    /// Effective concurrency for [`Self::write_all`] and
    /// [`Self::spawn_pipeline`].
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.max_concurrent
    }

    /// Capabilities used for link creation.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.context.capabilities
    }

    /// Resolves the options that would apply to `file`.
    ///
    /// # Errors
    ///
    /// See [`DestinationOptions::resolve`].
    pub fn resolve(&self, file: &VirtualFile) -> WriteResult<WriteOptions> {
        self.options
            .resolve(&self.out_folder, file, self.context.capabilities)
    }

    /// Writes one file and returns it with its observed metadata.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Collisions with overwriting disabled and
    /// directories that cannot be opened are not failures.
    pub async fn write(&self, mut file: VirtualFile) -> WriteResult<VirtualFile> {
        let options = self.resolve(&file)?;
        prepare(&mut file, &options);

        let parent = file.dirname().map(PathBuf::from);
        if let Some(parent) = parent {
            ensure_dir(&parent, options.dir_mode()).await?;
        }

        write_contents(&self.context, &mut file, &options).await?;
        trace_write_complete(file.path());
        Ok(file)
    }

    /// Writes every file with bounded concurrency.
    ///
    /// Results are returned in input order. A failed file does not stop the
    /// others.
    pub async fn write_all<I>(&self, files: I) -> Vec<WriteResult<VirtualFile>>
    where
        I: IntoIterator<Item = VirtualFile>,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for file in files {
            let permit = Arc::clone(&semaphore).acquire_owned().await;
            let destination = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                destination.write(file).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(error) => Err(WriteError::Join(error)),
            });
        }
        results
    }

    /// Writes files as they arrive on `input`.
    ///
    /// Results are sent in completion order. The returned channel closes once
    /// `input` is closed and every write has finished. Dropping the receiver
    /// lets in-flight writes finish but discards their results.
    #[must_use]
    pub fn spawn_pipeline(
        &self,
        mut input: mpsc::Receiver<VirtualFile>,
    ) -> mpsc::Receiver<WriteResult<VirtualFile>> {
        let (results, output) = mpsc::channel(self.max_concurrent);
        let destination = self.clone();

        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(destination.max_concurrent));
            let mut tasks = JoinSet::new();

            while let Some(file) = input.recv().await {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                while let Some(joined) = tasks.try_join_next() {
                    report_join(&results, joined).await;
                }

                let destination = destination.clone();
                let results = results.clone();
                tasks.spawn(async move {
                    let written = destination.write(file).await;
                    drop(permit);
                    let _ = results.send(written).await;
                });
            }

            while let Some(joined) = tasks.join_next().await {
                report_join(&results, joined).await;
            }
        });

        output
    }
}

async fn report_join(
    results: &mpsc::Sender<WriteResult<VirtualFile>>,
    joined: Result<(), tokio::task::JoinError>,
) {
    if let Err(error) = joined {
        let _ = results.send(Err(WriteError::Join(error))).await;
    }
}

/// Re-roots `file` under the resolved output folder and applies the resolved
/// mode.
fn prepare(file: &mut VirtualFile, options: &WriteOptions) {
    file.relocate(options.cwd().to_path_buf(), options.base().to_path_buf());
    file.stat_mut().mode = options.mode();
}
