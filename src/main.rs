// CyberRange: Deploying and operating GNS3 lab topologies
// Copyright (C) 2026 The CyberRange Authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use gns3_lab::{ConsoleSettings, Gns3Client, ScriptPusher, ScriptSpec};
use serde::Serialize;

use cyberrange::{
    collector::{
        group_by_layer, CollectorConfig, KeywordClassifier, ProjectRef, StudentLogging,
    },
    deploy::{deploy, DeployOptions},
    exec::{execute_on_nodes, push_stored_scripts, run_uploaded_scripts, PushItem, RunItem},
    store::{JsonProjectStore, JsonScriptRepository, JsonSessionStore, ProjectStore},
    RangeConfig, TopologyDefinition,
};

/// Deploy and operate GNS3 lab topologies.
#[derive(Debug, Parser)]
struct Cli {
    /// Configuration file. Defaults to the file named in `CYBERRANGE_CONFIG`.
    #[clap(long = "config", short = 'c')]
    config: Option<PathBuf>,
    /// Address of the GNS3 server, overriding the configuration.
    #[clap(long = "server-ip")]
    server_ip: Option<String>,
    /// What to do
    #[clap(subcommand)]
    command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
enum Command {
    /// Create the nodes and links of a topology and run its embedded scripts.
    Deploy {
        /// Topology definition (JSON)
        topology: PathBuf,
        /// Do not start the nodes (implies --no-scripts)
        #[clap(long)]
        no_start: bool,
        /// Do not run the embedded scripts
        #[clap(long)]
        no_scripts: bool,
    },
    /// Delete all nodes and links of a project.
    DeleteNodes {
        /// Project
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// List the nodes of a project, grouped by layer.
    Nodes {
        /// Project
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Push stored scripts to nodes of the deployed topology.
    Push {
        /// List of push items (JSON)
        items: PathBuf,
    },
    /// Run scripts that are already on nodes of the deployed topology.
    Run {
        /// List of run items (JSON)
        items: PathBuf,
    },
    /// Upload a local script to some nodes of a project and run it.
    Exec {
        /// Project
        #[clap(flatten)]
        project: ProjectArgs,
        /// Local script
        #[clap(long, short)]
        script: PathBuf,
        /// Node names
        #[clap(long, short, num_args = 1.., required = true)]
        nodes: Vec<String>,
        /// Destination on the nodes
        #[clap(long, default_value = "/tmp/script.sh")]
        remote_path: String,
        /// Execution timeout in seconds
        #[clap(long, default_value_t = 30.0)]
        timeout: f64,
        /// Interpreter
        #[clap(long, default_value = "sh")]
        shell: String,
    },
    /// Command logging of students.
    Logging {
        /// What to do
        #[clap(subcommand)]
        command: LoggingCommand,
    },
}

/// Subcommands of `logging`.
#[derive(Debug, Subcommand)]
enum LoggingCommand {
    /// Deploy the collectors of a student and instrument all nodes.
    Setup {
        /// Student name
        student: String,
        /// Project
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Show the session of a student.
    Status {
        /// Student name
        student: String,
    },
    /// Show the captured commands of a student.
    Preview {
        /// Student name
        student: String,
    },
    /// Remove the collectors and the session of a student.
    Teardown {
        /// Student name
        student: String,
    },
}

/// Reference to a project, by name or by id.
#[derive(Debug, clap::Args)]
#[group(required = true, multiple = false)]
struct ProjectArgs {
    /// Project name
    #[clap(long = "project", short = 'p')]
    name: Option<String>,
    /// Project id
    #[clap(long = "project-id")]
    id: Option<String>,
}

impl ProjectArgs {
    /// Turn the arguments into a project reference.
    fn project_ref(&self) -> ProjectRef {
        match (&self.id, &self.name) {
            (Some(id), _) => ProjectRef::Id(id.clone()),
            (None, name) => ProjectRef::Name(name.clone().unwrap_or_default()),
        }
    }

    /// Resolve the project id.
    async fn resolve(&self, client: &Gns3Client) -> Result<String, Box<dyn std::error::Error>> {
        Ok(match self.project_ref() {
            ProjectRef::Id(id) => id,
            ProjectRef::Name(name) => client.find_project_id(&name).await?,
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    let mut config = RangeConfig::discover(args.config.as_deref())?;
    if let Some(ip) = args.server_ip.clone() {
        config.server.ip = ip;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(args.command, config))
}

/// Print a value as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read a JSON file.
fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<T, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Execute a subcommand.
async fn run(command: Command, mut config: RangeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pusher = ScriptPusher::new(ConsoleSettings::default()).with_local_root(&config.scripts.root);
    let project_store = JsonProjectStore::new(&config.storage.project_record);

    match command {
        Command::Deploy {
            topology,
            no_start,
            no_scripts,
        } => {
            let def = TopologyDefinition::from_json_file(&topology)?;
            if let Some(ip) = def.server_ip.clone().filter(|ip| !ip.is_empty()) {
                config.server.ip = ip;
            }
            let client = config.server.client()?;
            let options = DeployOptions {
                start_nodes: !no_start,
                run_scripts: !no_scripts,
                request_delay: config.server.request_delay(),
                boot_delay: config.scripts.boot_delay(),
                stage_delay: config.scripts.stage_delay(),
                concurrency: config.scripts.concurrency,
            };
            let report = deploy(
                &client,
                &pusher,
                &project_store,
                &def,
                &config.server.ip,
                &options,
            )
            .await?;
            print_json(&report)?;
        }
        Command::DeleteNodes { project } => {
            let client = config.server.client()?;
            let project_id = project.resolve(&client).await?;
            print_json(&client.delete_all_nodes(&project_id).await)?;
        }
        Command::Nodes { project } => {
            let client = config.server.client()?;
            let project_id = project.resolve(&client).await?;
            let nodes = client.list_nodes(&project_id).await?;
            print_json(&group_by_layer(&KeywordClassifier, &nodes, &config.server.ip))?;
        }
        Command::Push { items } => {
            let items: Vec<PushItem> = read_json(&items)?;
            let record = project_store.load().await?;
            let scripts = JsonScriptRepository::new(&config.storage.scripts_dir);
            let results = push_stored_scripts(
                &record,
                &scripts,
                &pusher,
                &config.server.ip,
                &items,
                config.scripts.concurrency,
            )
            .await?;
            print_json(&results)?;
        }
        Command::Run { items } => {
            let items: Vec<RunItem> = read_json(&items)?;
            let record = project_store.load().await?;
            let results = run_uploaded_scripts(
                &record,
                &pusher,
                &config.server.ip,
                &items,
                config.scripts.concurrency,
            )
            .await?;
            print_json(&results)?;
        }
        Command::Exec {
            project,
            script,
            nodes,
            remote_path,
            timeout,
            shell,
        } => {
            let client = config.server.client()?;
            let project_id = project.resolve(&client).await?;
            let spec = ScriptSpec::local(remote_path, script)
                .shell(shell)
                .run_after_upload(Duration::try_from_secs_f64(timeout)?);
            let report = execute_on_nodes(
                &client,
                &pusher,
                &project_id,
                &config.server.ip,
                &nodes,
                &spec,
                config.scripts.concurrency,
            )
            .await?;
            print_json(&report)?;
        }
        Command::Logging { command } => {
            let client = config.server.client()?;
            let sessions = JsonSessionStore::new(&config.storage.sessions_dir);
            let logging = StudentLogging::new(
                &client,
                &sessions,
                config.server.ip.clone(),
                config.server.port,
            )
            .with_config(CollectorConfig::from(&config.collector));
            match command {
                LoggingCommand::Setup { student, project } => {
                    print_json(&logging.setup(&student, &project.project_ref()).await?)?
                }
                LoggingCommand::Status { student } => print_json(&logging.status(&student).await?)?,
                LoggingCommand::Preview { student } => {
                    print_json(&logging.preview(&student).await?)?
                }
                LoggingCommand::Teardown { student } => {
                    print_json(&logging.teardown(&student).await?)?
                }
            }
        }
    }
    Ok(())
}
