//! Pipeline driver: discovery, job planning, execution and packing

use crate::{
    CompileJob, CompileTarget, EntryPointSet, Error, FileSystemInclude, IncludeHandler,
    JobOutcome, JobReport, JobRunner, Result, Rewrite, Stage, StageMask, pack, rewrite,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Default output directory when none is given
pub const DEFAULT_OUTPUT_DIR: &str = "Assets/Shaders";

/// Default base name of the packed library
pub const DEFAULT_LIBRARY_NAME: &str = "Shaders";

/// Default extensions picked up by directory discovery
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["hlsl", "shader"];

/// One explicit `(file, entry, stage)` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    /// The shader file
    pub source: PathBuf,
    /// Entry point to compile
    pub entry_point: String,
    /// Stage to compile it for
    pub stage: Stage,
}

impl EntrySpec {
    /// Parses a flat `FILE ENTRY STAGE ...` argument list.
    ///
    /// The list must be non-empty and a multiple of three long.
    pub fn parse_triples<S: AsRef<str>>(args: &[S]) -> Result<Vec<EntrySpec>> {
        if args.is_empty() || args.len() % 3 != 0 {
            return Err(Error::Usage(format!(
                "expected one or more FILE ENTRY STAGE triples, got {} argument(s)",
                args.len()
            )));
        }
        args.chunks_exact(3)
            .map(|triple| {
                Ok(EntrySpec {
                    source: PathBuf::from(triple[0].as_ref()),
                    entry_point: triple[1].as_ref().to_string(),
                    stage: triple[2].as_ref().parse()?,
                })
            })
            .collect()
    }
}

/// Where shader sources come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSet {
    /// Every file with a matching extension under a directory, recursively
    Directory(PathBuf),
    /// An explicit list of shader files; entry points are extracted
    Files(Vec<PathBuf>),
    /// Explicit entry points; no extraction
    Entries(Vec<EntrySpec>),
}

/// Switches controlling one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Input selection
    pub sources: SourceSet,
    /// Directory receiving artifacts
    pub output_dir: PathBuf,
    /// Include injected ahead of every shader
    pub forced_include: Option<String>,
    /// Symbol every entry point is renamed to before compiling
    pub entry_symbol: Option<String>,
    /// Stages to compile
    pub stages: StageMask,
    /// Concurrent compiler processes; 1 runs jobs in order
    pub jobs: usize,
    /// Per-process deadline
    pub timeout: Option<Duration>,
    /// Base name of the packed library
    pub library_name: String,
    /// Where rewritten sources are written
    pub temp_dir: Option<PathBuf>,
    /// Extensions picked up by directory discovery
    pub extensions: Vec<String>,
}

impl PipelineOptions {
    /// Creates options with defaults for everything but the inputs.
    pub fn new(sources: SourceSet, output_dir: impl Into<PathBuf>) -> Self {
        PipelineOptions {
            sources,
            output_dir: output_dir.into(),
            forced_include: None,
            entry_symbol: None,
            stages: StageMask::all(),
            jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
            timeout: None,
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            temp_dir: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Aggregated result of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Every job, in planning order
    pub jobs: Vec<JobReport>,
    /// The packed library, when the backend packs and packing ran
    pub library: Option<PathBuf>,
}

impl RunReport {
    /// Jobs that did not succeed
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| !j.outcome.is_success())
    }

    /// Number of successful jobs
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|j| j.outcome.is_success()).count()
    }

    /// True when every job succeeded
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Launch failures, usually a misconfigured compiler path
    pub fn launch_failures(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.outcome, JobOutcome::Launch { .. }))
            .count()
    }

    /// Artifact paths of successful jobs, each listed once.
    ///
    /// Repeated entry points write the same artifact, so the list is
    /// deduplicated in first-seen order.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.jobs
            .iter()
            .filter_map(|j| j.outcome.artifact())
            .filter(|path| seen.insert(*path))
            .map(Path::to_path_buf)
            .collect()
    }
}

/// Drives discovery, compilation and packing for one run.
pub struct Pipeline<'a> {
    target: &'a CompileTarget,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline over a resolved target.
    pub fn new(target: &'a CompileTarget, options: PipelineOptions) -> Self {
        Pipeline { target, options }
    }

    /// Path of the packed library for this run
    pub fn library_path(&self) -> PathBuf {
        self.options.output_dir.join(format!(
            "{}.{}",
            self.options.library_name,
            self.target.extension()
        ))
    }

    /// Runs the whole pipeline.
    ///
    /// Fatal problems (nothing discovered, output directory, missing forced
    /// include, packing) are errors. Per-job compiler failures are not: every
    /// job runs and the failures are in the returned report.
    pub fn run(&self) -> Result<RunReport> {
        let sources = self.discover()?;
        self.ensure_output_dir()?;
        let jobs = self.plan(&sources)?;
        let total = jobs.len();

        let mut report = RunReport {
            jobs: self.execute(jobs),
            library: None,
        };
        log::info!("Compiled {} of {} entry points", report.succeeded(), total);

        if let Some(step) = &self.target.pack {
            let artifacts = report.artifacts();
            let library = self.library_path();
            if !report.is_success() {
                log::warn!(
                    "Skipping pack step for {}: {} job(s) failed",
                    library.display(),
                    total - report.succeeded()
                );
                pack::remove_intermediates(&artifacts, &library);
            } else if artifacts.is_empty() {
                log::warn!("Nothing to pack into {}", library.display());
            } else {
                step.run(&library, &artifacts, self.options.timeout)?;
                report.library = Some(library);
            }
        }

        Ok(report)
    }

    /// Expands the source set into shader files.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let sources = match &self.options.sources {
            SourceSet::Directory(dir) => {
                let found = self.walk(dir);
                if found.is_empty() {
                    return Err(Error::NoShadersFound(dir.display().to_string()));
                }
                found
            }
            SourceSet::Files(files) => files.clone(),
            SourceSet::Entries(entries) => {
                let mut seen = HashSet::new();
                entries
                    .iter()
                    .filter(|e| seen.insert(e.source.clone()))
                    .map(|e| e.source.clone())
                    .collect()
            }
        };

        if sources.is_empty() {
            return Err(Error::NoShadersFound("the given file list".to_string()));
        }
        log::debug!("Discovered {} shader file(s)", sources.len());
        Ok(sources)
    }

    fn walk(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| self.has_shader_extension(path))
            .collect()
    }

    fn has_shader_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.options
                    .extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }

    fn ensure_output_dir(&self) -> Result<()> {
        let path = &self.options.output_dir;
        std::fs::create_dir_all(path).map_err(|source| Error::OutputDirectory {
            path: path.clone(),
            source,
        })
    }

    /// Creates one job per selected `(source, stage, entry)`.
    pub fn plan(&self, sources: &[PathBuf]) -> Result<Vec<CompileJob>> {
        let mut jobs = Vec::new();
        for source in sources {
            let entries = self.entries_for(source)?;
            if entries.is_empty() {
                log::warn!("No entry points found in {}", source.display());
                continue;
            }

            let search = self.search_dirs(source);
            let include = match &self.options.forced_include {
                Some(name) => Some(FileSystemInclude::from_paths(&search).open(name)?),
                None => None,
            };

            for (stage, entry) in entries.iter() {
                jobs.push(CompileJob {
                    source: source.clone(),
                    entry_point: entry.to_string(),
                    stage,
                    output_dir: self.options.output_dir.clone(),
                    include_dirs: search.clone(),
                    rewrite: Rewrite {
                        include: include.clone(),
                        rename: self
                            .options
                            .entry_symbol
                            .as_ref()
                            .map(|symbol| (entry.to_string(), symbol.clone())),
                    },
                });
            }
        }

        self.check_artifact_names(&jobs)?;
        Ok(jobs)
    }

    fn entries_for(&self, source: &Path) -> Result<EntryPointSet> {
        let mut entries = match &self.options.sources {
            SourceSet::Entries(specs) => {
                let mut set = EntryPointSet::new();
                for spec in specs.iter().filter(|s| s.source == source) {
                    set.push(spec.stage, spec.entry_point.clone());
                }
                set
            }
            SourceSet::Directory(_) | SourceSet::Files(_) => {
                let bytes = std::fs::read(source).map_err(|e| Error::ReadSource {
                    path: source.to_path_buf(),
                    source: e,
                })?;
                EntryPointSet::extract(&String::from_utf8_lossy(&bytes))
            }
        };
        entries.retain(self.options.stages);
        Ok(entries)
    }

    /// Include search order: the shader's directory, the runtime include
    /// directories, then the forced include's own directory.
    fn search_dirs(&self, source: &Path) -> Vec<PathBuf> {
        let mut dirs = vec![rewrite::origin_dir(source)];
        dirs.extend(self.target.include_dirs.iter().cloned());
        if let Some(parent) = self
            .options
            .forced_include
            .as_deref()
            .and_then(|name| Path::new(name).parent())
            .filter(|p| !p.as_os_str().is_empty())
        {
            dirs.push(parent.to_path_buf());
        }
        dirs
    }

    fn check_artifact_names(&self, jobs: &[CompileJob]) -> Result<()> {
        let extension = self.target.extension();
        let library = self.library_path();
        let mut seen = HashSet::new();
        for job in jobs {
            let artifact = job.artifact_path(extension);
            if self.target.requires_packing() && artifact == library {
                return Err(Error::Usage(format!(
                    "entry point {} in {} collides with the packed library name {}",
                    job.entry_point,
                    job.source.display(),
                    library.display()
                )));
            }
            if !seen.insert(artifact.clone()) {
                log::warn!(
                    "{} is produced by more than one job; the last one to finish wins",
                    artifact.display()
                );
            }
        }
        Ok(())
    }

    fn execute(&self, jobs: Vec<CompileJob>) -> Vec<JobReport> {
        let runner = JobRunner::new(self.target)
            .temp_dir(self.options.temp_dir.clone())
            .timeout(self.options.timeout);

        if self.options.jobs <= 1 || jobs.len() <= 1 {
            return jobs.into_iter().map(|job| runner.run(job)).collect();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
        {
            Ok(pool) => pool.install(|| jobs.into_par_iter().map(|job| runner.run(job)).collect()),
            Err(e) => {
                log::warn!("Failed to start worker pool ({}), compiling sequentially", e);
                jobs.into_iter().map(|job| runner.run(job)).collect()
            }
        }
    }
}
