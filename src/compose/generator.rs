//! Compose descriptor generation
//!
//! Turns [`ProjectOptions`] into a [`ComposeConfig`]. Each switch contributes
//! its services in a fixed order: api, taskiq-worker, db, migrator, redis,
//! rmq, zookeeper, kafka. Startup order is left to the dependency
//! declarations; list position carries no meaning beyond readability.

use super::config::{
    BuildConfig, BuildConfigFull, CommandConfig, ComposeConfig, DependencyCondition,
    DependsOnCondition, DependsOnConfig, EnvFileConfig, EnvironmentConfig, HealthcheckConfig,
    HealthcheckTest, LabelsConfig, NetworkConfig, NetworksConfig, RestartPolicy, ServiceConfig,
    VolumeConfig, VolumeMount,
};
use crate::error::Result;
use crate::project::{DatabaseKind, Orm, ProjectOptions};
use indexmap::IndexMap;

pub const API_SERVICE: &str = "api";
pub const WORKER_SERVICE: &str = "taskiq-worker";
pub const DB_SERVICE: &str = "db";
pub const MIGRATOR_SERVICE: &str = "migrator";
pub const REDIS_SERVICE: &str = "redis";
pub const RMQ_SERVICE: &str = "rmq";
pub const ZOOKEEPER_SERVICE: &str = "zookeeper";
pub const KAFKA_SERVICE: &str = "kafka";

pub const TRAEFIK_NETWORK: &str = "traefik-shared";
pub const DEFAULT_NETWORK: &str = "default";

pub const REDIS_IMAGE: &str = "bitnami/redis:6.2.5";
pub const RMQ_IMAGE: &str = "rabbitmq:3.9.16-alpine";
pub const ZOOKEEPER_IMAGE: &str = "bitnami/zookeeper:3.7.1";
pub const KAFKA_IMAGE: &str = "bitnami/kafka:3.2.0";

/// Path of the sqlite file inside containers
pub const SQLITE_FILE: &str = "/db_data/db.sqlite3";
const SQLITE_MOUNT: &str = "/db_data/";

const KAFKA_PORT: u16 = 9092;
const ZOOKEEPER_PORT: u16 = 2181;

/// Fixed healthcheck schedule for a service kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub interval: &'static str,
    pub timeout: &'static str,
    pub retries: u32,
}

pub const POSTGRES_PROBE: Probe = Probe { interval: "2s", timeout: "3s", retries: 40 };
pub const MYSQL_PROBE: Probe = Probe { interval: "10s", timeout: "5s", retries: 40 };
pub const REDIS_PROBE: Probe = Probe { interval: "1s", timeout: "3s", retries: 50 };
pub const RMQ_PROBE: Probe = Probe { interval: "3s", timeout: "3s", retries: 50 };
pub const ZOOKEEPER_PROBE: Probe = Probe { interval: "1s", timeout: "3s", retries: 30 };
pub const KAFKA_PROBE: Probe = Probe { interval: "1s", timeout: "3s", retries: 30 };

impl Probe {
    fn healthcheck(&self, test: impl Into<String>) -> HealthcheckConfig {
        HealthcheckConfig {
            test: Some(HealthcheckTest::Command(test.into())),
            interval: Some(self.interval.to_string()),
            timeout: Some(self.timeout.to_string()),
            retries: Some(self.retries),
            start_period: None,
        }
    }
}

/// Generate the compose descriptor for a project
///
/// Fails with `InvalidConfig` if the options do not validate; no partial
/// descriptor is ever returned.
pub fn generate(options: &ProjectOptions) -> Result<ComposeConfig> {
    options.validate()?;

    let mut services: Vec<(&str, ServiceConfig)> = Vec::new();

    let api = api_service(options);
    let worker = options.enable_taskiq.then(|| worker_service(options, &api));
    services.push((API_SERVICE, api));
    if let Some(worker) = worker {
        services.push((WORKER_SERVICE, worker));
    }

    if let Some(db) = db_service(options) {
        services.push((DB_SERVICE, db));
    }

    if options.enable_migrations {
        services.push((MIGRATOR_SERVICE, migrator_service(options)));
    }

    if options.enable_redis {
        services.push((REDIS_SERVICE, redis_service(options)));
    }

    if options.enable_rmq {
        services.push((RMQ_SERVICE, rmq_service(options)));
    }

    if options.enable_kafka {
        services.push((ZOOKEEPER_SERVICE, zookeeper_service(options)));
        services.push((KAFKA_SERVICE, kafka_service(options)));
    }

    let mut config = ComposeConfig::default();
    for (name, service) in services {
        tracing::debug!("Adding service: {}", name);
        config.services.insert(name.to_string(), service);
    }

    if options.database.kind != DatabaseKind::None {
        let volume = options.db_volume();
        config.volumes.insert(
            volume.clone(),
            VolumeConfig {
                name: Some(volume),
                ..Default::default()
            },
        );
    }

    if options.traefik_labels {
        config.networks.insert(
            TRAEFIK_NETWORK.to_string(),
            NetworkConfig {
                name: Some(TRAEFIK_NETWORK.to_string()),
                ..Default::default()
            },
        );
    }

    tracing::debug!(
        "Generated {} services, {} volumes, {} networks for {}",
        config.services.len(),
        config.volumes.len(),
        config.networks.len(),
        options.project_name
    );

    Ok(config)
}

fn healthy(names: &[&str]) -> Option<DependsOnConfig> {
    if names.is_empty() {
        return None;
    }

    let map: IndexMap<String, DependsOnCondition> = names
        .iter()
        .map(|name| {
            (
                name.to_string(),
                DependsOnCondition {
                    condition: DependencyCondition::ServiceHealthy,
                },
            )
        })
        .collect();

    Some(DependsOnConfig::Map(map))
}

/// Connection variables for a database server container
fn db_connection_env(options: &ProjectOptions) -> Vec<(String, String)> {
    let prefix = options.env_prefix();
    let name = &options.project_name;
    let port = options
        .database
        .port()
        .map(|p| p.to_string())
        .unwrap_or_default();

    vec![
        (format!("{}_DB_HOST", prefix), options.hostname("db")),
        (format!("{}_DB_PORT", prefix), port),
        (format!("{}_DB_USER", prefix), name.clone()),
        (format!("{}_DB_PASS", prefix), name.clone()),
        (format!("{}_DB_BASE", prefix), name.clone()),
    ]
}

fn sqlite_mount(options: &ProjectOptions) -> VolumeMount {
    VolumeMount::Short(format!("{}:{}", options.db_volume(), SQLITE_MOUNT))
}

fn traefik_labels(options: &ProjectOptions) -> Vec<String> {
    let name = &options.project_name;
    let prefix = options.env_prefix();

    vec![
        "traefik.enable=true".to_string(),
        format!(
            "traefik.http.routers.{name}.rule=Host(`${{{prefix}_TRAEFIK_HOST:-{name}.localhost}}`)"
        ),
        format!("traefik.http.routers.{name}.entrypoints=http"),
        format!("traefik.http.routers.{name}.service={name}"),
        format!("traefik.http.services.{name}.loadbalancer.server.port=${{{prefix}_PORT:-8000}}"),
    ]
}

fn api_service(options: &ProjectOptions) -> ServiceConfig {
    let prefix = options.env_prefix();

    let mut env = vec![(format!("{}_HOST", prefix), "0.0.0.0".to_string())];
    match options.database.kind {
        DatabaseKind::Sqlite => {
            env.push((format!("{}_DB_FILE", prefix), SQLITE_FILE.to_string()));
        }
        DatabaseKind::Postgresql | DatabaseKind::Mysql => env.extend(db_connection_env(options)),
        DatabaseKind::None => {}
    }
    if options.enable_rmq {
        env.push((format!("{}_RABBIT_HOST", prefix), options.hostname("rmq")));
    }
    if options.enable_redis {
        env.push((format!("{}_REDIS_HOST", prefix), options.hostname("redis")));
    }
    if options.enable_kafka {
        env.push((
            format!("{}_KAFKA_BOOTSTRAP_SERVERS", prefix),
            format!("[\"{}:{}\"]", options.hostname("kafka"), KAFKA_PORT),
        ));
    }

    let mut deps = Vec::new();
    if options.database.kind.is_server() {
        deps.push(DB_SERVICE);
    }
    if options.enable_redis {
        deps.push(REDIS_SERVICE);
    }
    if options.enable_rmq {
        deps.push(RMQ_SERVICE);
    }
    if options.enable_kafka {
        deps.push(KAFKA_SERVICE);
    }

    let (labels, networks) = if options.traefik_labels {
        (
            Some(LabelsConfig::Array(traefik_labels(options))),
            Some(NetworksConfig::Array(vec![
                DEFAULT_NETWORK.to_string(),
                TRAEFIK_NETWORK.to_string(),
            ])),
        )
    } else {
        (None, None)
    };

    ServiceConfig {
        build: Some(BuildConfig::Full(BuildConfigFull {
            context: Some(".".to_string()),
            dockerfile: Some("./Dockerfile".to_string()),
            target: None,
        })),
        image: Some(options.app_image()),
        restart: Some(RestartPolicy::Always),
        env_file: Some(EnvFileConfig::Multiple(vec![".env".to_string()])),
        labels,
        networks,
        depends_on: healthy(&deps),
        environment: Some(EnvironmentConfig::from_pairs(env)),
        volumes: (options.database.kind == DatabaseKind::Sqlite)
            .then(|| vec![sqlite_mount(options)]),
        ..Default::default()
    }
}

/// The worker runs the application image with the broker entrypoint
fn worker_service(options: &ProjectOptions, api: &ServiceConfig) -> ServiceConfig {
    ServiceConfig {
        labels: None,
        command: Some(CommandConfig::Exec(vec![
            "taskiq".to_string(),
            "worker".to_string(),
            format!("{}.tkq:broker", options.project_name),
        ])),
        ..api.clone()
    }
}

fn db_service(options: &ProjectOptions) -> Option<ServiceConfig> {
    let name = options.project_name.as_str();
    let volume = options.db_volume();

    let (env, data_dir, healthcheck) = match options.database.kind {
        DatabaseKind::Postgresql => (
            EnvironmentConfig::from_pairs([
                ("POSTGRES_PASSWORD", name),
                ("POSTGRES_USER", name),
                ("POSTGRES_DB", name),
            ]),
            "/var/lib/postgresql/data",
            POSTGRES_PROBE.healthcheck(format!("pg_isready -U {}", name)),
        ),
        DatabaseKind::Mysql => (
            EnvironmentConfig::from_pairs([
                ("MYSQL_PASSWORD", name),
                ("MYSQL_USER", name),
                ("MYSQL_DATABASE", name),
                ("MYSQL_ROOT_PASSWORD", name),
            ]),
            "/bitnami/mysql/data",
            MYSQL_PROBE.healthcheck("mysqladmin ping -h localhost"),
        ),
        DatabaseKind::Sqlite | DatabaseKind::None => return None,
    };

    Some(ServiceConfig {
        image: options.database.image().map(str::to_string),
        hostname: Some(options.hostname("db")),
        restart: Some(RestartPolicy::Always),
        environment: Some(env),
        volumes: Some(vec![VolumeMount::Short(format!("{}:{}", volume, data_dir))]),
        healthcheck: Some(healthcheck),
        ..Default::default()
    })
}

fn migrator_service(options: &ProjectOptions) -> ServiceConfig {
    let prefix = options.env_prefix();

    let mut env = Vec::new();
    let mut volumes = None;
    let mut depends_on = None;
    match options.database.kind {
        DatabaseKind::Sqlite => {
            env.push((format!("{}_DB_FILE", prefix), SQLITE_FILE.to_string()));
            volumes = Some(vec![sqlite_mount(options)]);
        }
        DatabaseKind::Postgresql | DatabaseKind::Mysql => {
            env.extend(db_connection_env(options));
            depends_on = healthy(&[DB_SERVICE]);
        }
        DatabaseKind::None => {}
    }
    if options.orm == Orm::Piccolo {
        env.push((
            "PICCOLO_CONF".to_string(),
            format!("{}.piccolo_conf", options.project_name),
        ));
    }

    ServiceConfig {
        image: Some(options.app_image()),
        restart: Some(RestartPolicy::No),
        command: options
            .orm
            .migration_command()
            .map(|cmd| CommandConfig::Shell(cmd.to_string())),
        environment: (!env.is_empty()).then(|| EnvironmentConfig::from_pairs(env)),
        volumes,
        depends_on,
        ..Default::default()
    }
}

fn redis_service(options: &ProjectOptions) -> ServiceConfig {
    ServiceConfig {
        image: Some(REDIS_IMAGE.to_string()),
        hostname: Some(options.hostname("redis")),
        restart: Some(RestartPolicy::Always),
        environment: Some(EnvironmentConfig::from_pairs([("ALLOW_EMPTY_PASSWORD", "yes")])),
        healthcheck: Some(REDIS_PROBE.healthcheck("redis-cli ping")),
        ..Default::default()
    }
}

fn rmq_service(options: &ProjectOptions) -> ServiceConfig {
    ServiceConfig {
        image: Some(RMQ_IMAGE.to_string()),
        hostname: Some(options.hostname("rmq")),
        restart: Some(RestartPolicy::Always),
        environment: Some(EnvironmentConfig::from_pairs([
            ("RABBITMQ_DEFAULT_USER", "guest"),
            ("RABBITMQ_DEFAULT_PASS", "guest"),
            ("RABBITMQ_DEFAULT_VHOST", "/"),
        ])),
        healthcheck: Some(RMQ_PROBE.healthcheck("rabbitmq-diagnostics check_running -q")),
        ..Default::default()
    }
}

fn zookeeper_service(options: &ProjectOptions) -> ServiceConfig {
    ServiceConfig {
        image: Some(ZOOKEEPER_IMAGE.to_string()),
        hostname: Some(options.hostname("zookeeper")),
        environment: Some(EnvironmentConfig::from_pairs([
            ("ALLOW_ANONYMOUS_LOGIN", "yes"),
            ("ZOO_LOG_LEVEL", "ERROR"),
        ])),
        healthcheck: Some(ZOOKEEPER_PROBE.healthcheck("zkServer.sh status")),
        ..Default::default()
    }
}

fn kafka_service(options: &ProjectOptions) -> ServiceConfig {
    let kafka_host = options.hostname("kafka");
    let zookeeper_host = options.hostname("zookeeper");

    ServiceConfig {
        image: Some(KAFKA_IMAGE.to_string()),
        hostname: Some(kafka_host.clone()),
        environment: Some(EnvironmentConfig::from_pairs([
            ("KAFKA_BROKER_ID".to_string(), "1".to_string()),
            ("ALLOW_PLAINTEXT_LISTENER".to_string(), "yes".to_string()),
            (
                "KAFKA_CFG_LISTENERS".to_string(),
                format!("PLAINTEXT://0.0.0.0:{}", KAFKA_PORT),
            ),
            (
                "KAFKA_CFG_ADVERTISED_LISTENERS".to_string(),
                format!("PLAINTEXT://{}:{}", kafka_host, KAFKA_PORT),
            ),
            (
                "KAFKA_CFG_ZOOKEEPER_CONNECT".to_string(),
                format!("{}:{}", zookeeper_host, ZOOKEEPER_PORT),
            ),
        ])),
        healthcheck: Some(KAFKA_PROBE.healthcheck(format!(
            "kafka-topics.sh --list --bootstrap-server localhost:{}",
            KAFKA_PORT
        ))),
        depends_on: healthy(&[ZOOKEEPER_SERVICE]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parser::ComposeParser;
    use crate::error::StackforgeError;
    use crate::project::DatabaseOptions;

    fn options(database: DatabaseKind) -> ProjectOptions {
        let mut options = ProjectOptions::new("myapp");
        options.database = DatabaseOptions::new(database);
        options
    }

    fn everything_on(database: DatabaseKind, orm: Orm) -> ProjectOptions {
        let mut options = options(database);
        options.orm = orm;
        options.enable_redis = true;
        options.enable_rmq = true;
        options.enable_kafka = true;
        options.enable_taskiq = true;
        options.enable_migrations = true;
        options.traefik_labels = true;
        options
    }

    fn healthcheck_of(config: &ComposeConfig, service: &str) -> HealthcheckConfig {
        config.service(service).unwrap().healthcheck.clone().unwrap()
    }

    #[test]
    fn test_all_switches_off() {
        let config = generate(&options(DatabaseKind::None)).unwrap();

        assert_eq!(config.service_names(), vec!["api"]);
        assert!(config.volumes.is_empty());
        assert!(config.networks.is_empty());

        let api = config.service("api").unwrap();
        assert_eq!(api.env_var("MYAPP_HOST"), Some("0.0.0.0"));
        assert!(api.depends_on.is_none());
        assert!(api.labels.is_none());
        assert_eq!(api.image.as_deref(), Some("myapp:${MYAPP_VERSION:-latest}"));
        assert_eq!(api.restart, Some(RestartPolicy::Always));
    }

    #[test]
    fn test_postgres_redis_sqlalchemy_migrations() {
        let mut opts = options(DatabaseKind::Postgresql);
        opts.enable_redis = true;
        opts.enable_migrations = true;
        opts.orm = Orm::Sqlalchemy;

        let config = generate(&opts).unwrap();
        assert_eq!(config.service_names(), vec!["api", "db", "migrator", "redis"]);

        let migrator = config.service("migrator").unwrap();
        assert_eq!(
            migrator.dependency_condition("db"),
            Some(DependencyCondition::ServiceHealthy)
        );
        assert_eq!(
            migrator.command,
            Some(CommandConfig::Shell("alembic upgrade head".to_string()))
        );
        assert_eq!(migrator.restart, Some(RestartPolicy::No));
        assert_eq!(migrator.env_var("MYAPP_DB_HOST"), Some("myapp-db"));
        assert_eq!(migrator.env_var("MYAPP_DB_PORT"), Some("5432"));

        let api = config.service("api").unwrap();
        assert_eq!(api.dependency_names(), vec!["db", "redis"]);
        assert_eq!(api.env_var("MYAPP_REDIS_HOST"), Some("myapp-redis"));

        let db = config.service("db").unwrap();
        assert_eq!(db.image.as_deref(), Some("postgres:13.8-bullseye"));
        assert_eq!(db.hostname.as_deref(), Some("myapp-db"));
        assert_eq!(db.env_var("POSTGRES_DB"), Some("myapp"));

        assert_eq!(config.volumes.len(), 1);
        assert_eq!(
            config.volumes["myapp-db-data"].name.as_deref(),
            Some("myapp-db-data")
        );
    }

    #[test]
    fn test_sqlite_piccolo_migrations() {
        let mut opts = options(DatabaseKind::Sqlite);
        opts.enable_migrations = true;
        opts.orm = Orm::Piccolo;

        let config = generate(&opts).unwrap();
        assert_eq!(config.service_names(), vec!["api", "migrator"]);
        assert_eq!(config.volumes.len(), 1);
        assert!(config.volumes.contains_key("myapp-db-data"));

        let migrator = config.service("migrator").unwrap();
        assert_eq!(migrator.env_var("PICCOLO_CONF"), Some("myapp.piccolo_conf"));
        assert_eq!(migrator.env_var("MYAPP_DB_FILE"), Some(SQLITE_FILE));
        assert_eq!(migrator.env_var("MYAPP_DB_HOST"), None);
        assert_eq!(migrator.env_var("MYAPP_DB_PORT"), None);
        assert!(migrator.depends_on.is_none());
        assert_eq!(
            migrator.command,
            Some(CommandConfig::Shell("piccolo migrations forwards all".to_string()))
        );

        let api = config.service("api").unwrap();
        let mount = VolumeMount::Short("myapp-db-data:/db_data/".to_string());
        assert_eq!(api.volumes, Some(vec![mount.clone()]));
        assert_eq!(migrator.volumes, Some(vec![mount]));
        assert!(api.depends_on.is_none());
    }

    #[test]
    fn test_no_database_means_no_db_artifacts() {
        for orm in Orm::ALL {
            let mut opts = everything_on(DatabaseKind::None, orm);
            opts.traefik_labels = false;
            let config = generate(&opts).unwrap();

            assert!(config.service("db").is_none());
            assert!(config.volumes.is_empty());

            let migrator = config.service("migrator").unwrap();
            assert_eq!(migrator.env_var("MYAPP_DB_HOST"), None);
            assert_eq!(migrator.env_var("MYAPP_DB_FILE"), None);
            assert!(migrator.depends_on.is_none());
            assert_eq!(
                migrator.command,
                orm.migration_command()
                    .map(|c| CommandConfig::Shell(c.to_string()))
            );
        }
    }

    #[test]
    fn test_kafka_depends_on_healthy_zookeeper() {
        let mut opts = options(DatabaseKind::None);
        opts.enable_kafka = true;

        let config = generate(&opts).unwrap();
        assert_eq!(config.service_names(), vec!["api", "zookeeper", "kafka"]);

        let kafka = config.service("kafka").unwrap();
        assert_eq!(
            kafka.dependency_condition("zookeeper"),
            Some(DependencyCondition::ServiceHealthy)
        );
        assert_eq!(
            kafka.env_var("KAFKA_CFG_ZOOKEEPER_CONNECT"),
            Some("myapp-zookeeper:2181")
        );

        let api = config.service("api").unwrap();
        assert_eq!(
            api.env_var("MYAPP_KAFKA_BOOTSTRAP_SERVERS"),
            Some("[\"myapp-kafka:9092\"]")
        );
        assert_eq!(
            api.dependency_condition("kafka"),
            Some(DependencyCondition::ServiceHealthy)
        );
    }

    #[test]
    fn test_traefik_network_and_labels() {
        let mut opts = options(DatabaseKind::None);
        opts.traefik_labels = true;

        let config = generate(&opts).unwrap();
        assert_eq!(config.networks.len(), 1);
        assert_eq!(
            config.networks["traefik-shared"].name.as_deref(),
            Some("traefik-shared")
        );

        let api = config.service("api").unwrap();
        assert_eq!(api.network_names(), vec!["default", "traefik-shared"]);

        let labels = api.label_list();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0], "traefik.enable=true");
        assert_eq!(
            labels[1],
            "traefik.http.routers.myapp.rule=Host(`${MYAPP_TRAEFIK_HOST:-myapp.localhost}`)"
        );
        assert_eq!(
            labels[4],
            "traefik.http.services.myapp.loadbalancer.server.port=${MYAPP_PORT:-8000}"
        );
    }

    #[test]
    fn test_worker_mirrors_api_without_labels() {
        let mut opts = options(DatabaseKind::Postgresql);
        opts.enable_taskiq = true;
        opts.traefik_labels = true;

        let config = generate(&opts).unwrap();
        assert_eq!(config.service_names(), vec!["api", "taskiq-worker", "db"]);

        let api = config.service("api").unwrap();
        let worker = config.service("taskiq-worker").unwrap();
        assert!(worker.labels.is_none());
        assert_eq!(worker.environment, api.environment);
        assert_eq!(worker.depends_on, api.depends_on);
        assert_eq!(worker.network_names(), api.network_names());
        assert_eq!(
            worker.command,
            Some(CommandConfig::Exec(vec![
                "taskiq".to_string(),
                "worker".to_string(),
                "myapp.tkq:broker".to_string(),
            ]))
        );
    }

    #[test]
    fn test_healthcheck_constants() {
        let config = generate(&everything_on(DatabaseKind::Postgresql, Orm::Tortoise)).unwrap();

        let cases = [
            ("db", "pg_isready -U myapp", "2s", "3s", 40),
            ("redis", "redis-cli ping", "1s", "3s", 50),
            ("rmq", "rabbitmq-diagnostics check_running -q", "3s", "3s", 50),
            ("zookeeper", "zkServer.sh status", "1s", "3s", 30),
            (
                "kafka",
                "kafka-topics.sh --list --bootstrap-server localhost:9092",
                "1s",
                "3s",
                30,
            ),
        ];

        for (service, test, interval, timeout, retries) in cases {
            let hc = healthcheck_of(&config, service);
            assert_eq!(hc.test, Some(HealthcheckTest::Command(test.to_string())), "{}", service);
            assert_eq!(hc.interval.as_deref(), Some(interval), "{}", service);
            assert_eq!(hc.timeout.as_deref(), Some(timeout), "{}", service);
            assert_eq!(hc.retries, Some(retries), "{}", service);
        }

        let mysql = generate(&options(DatabaseKind::Mysql)).unwrap();
        let hc = healthcheck_of(&mysql, "db");
        assert_eq!(
            hc.test,
            Some(HealthcheckTest::Command("mysqladmin ping -h localhost".to_string()))
        );
        assert_eq!(hc.interval.as_deref(), Some("10s"));
        assert_eq!(hc.timeout.as_deref(), Some("5s"));
        assert_eq!(hc.retries, Some(40));
    }

    #[test]
    fn test_full_stack_order() {
        let config = generate(&everything_on(DatabaseKind::Mysql, Orm::Tortoise)).unwrap();
        assert_eq!(
            config.service_names(),
            vec![
                "api",
                "taskiq-worker",
                "db",
                "migrator",
                "redis",
                "rmq",
                "zookeeper",
                "kafka"
            ]
        );

        let api = config.service("api").unwrap();
        assert_eq!(api.dependency_names(), vec!["db", "redis", "rmq", "kafka"]);
        assert_eq!(api.env_var("MYAPP_RABBIT_HOST"), Some("myapp-rmq"));
        assert_eq!(api.env_var("MYAPP_DB_PORT"), Some("3306"));

        let db = config.service("db").unwrap();
        assert_eq!(db.env_var("MYSQL_ROOT_PASSWORD"), Some("myapp"));
        assert_eq!(
            db.volumes,
            Some(vec![VolumeMount::Short("myapp-db-data:/bitnami/mysql/data".to_string())])
        );
    }

    #[test]
    fn test_custom_database_image_and_port() {
        let mut opts = options(DatabaseKind::Postgresql);
        opts.database.image = Some("postgres:16".to_string());
        opts.database.port = Some(6432);

        let config = generate(&opts).unwrap();
        assert_eq!(config.service("db").unwrap().image.as_deref(), Some("postgres:16"));
        assert_eq!(config.service("api").unwrap().env_var("MYAPP_DB_PORT"), Some("6432"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let opts = everything_on(DatabaseKind::Postgresql, Orm::Piccolo);

        let first = generate(&opts).unwrap();
        let second = generate(&opts).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            ComposeParser::render(&first).unwrap(),
            ComposeParser::render(&second).unwrap()
        );
    }

    fn top_level_keys(rendered: &str) -> Vec<&str> {
        rendered
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.starts_with('-') && l.ends_with(':'))
            .collect()
    }

    #[test]
    fn test_rendered_manifest() {
        let mut opts = options(DatabaseKind::Postgresql);
        opts.enable_redis = true;
        opts.enable_migrations = true;
        opts.orm = Orm::Sqlalchemy;

        let rendered = ComposeParser::render(&generate(&opts).unwrap()).unwrap();

        assert_eq!(top_level_keys(&rendered), vec!["services:", "volumes:"]);
        assert!(rendered.contains("  myapp-db-data:\n    name: myapp-db-data\n"));

        // migrator waits on a healthy db
        assert!(rendered.contains("    depends_on:\n      db:\n        condition: service_healthy\n"));
        assert!(rendered.contains("    command: alembic upgrade head\n"));
        assert!(rendered.contains("    restart: 'no'\n"));
        assert!(!rendered.contains("restart: no\n"));

        assert!(rendered.contains("      ALLOW_EMPTY_PASSWORD: 'yes'\n"));
        assert!(rendered.contains("      MYAPP_DB_PORT: '5432'\n"));

        assert!(rendered.contains("      test: pg_isready -U myapp\n"));
        assert!(rendered.contains("      interval: 2s\n"));
        assert!(rendered.contains("      retries: 40\n"));
        assert!(rendered.contains("      test: redis-cli ping\n"));
        assert!(rendered.contains("      retries: 50\n"));

        assert!(!rendered.contains("networks:"));
        assert!(!rendered.contains("labels:"));
    }

    #[test]
    fn test_rendered_manifest_quotes_kafka_flags() {
        let mut opts = options(DatabaseKind::None);
        opts.enable_kafka = true;

        let rendered = ComposeParser::render(&generate(&opts).unwrap()).unwrap();
        assert!(rendered.contains("      ALLOW_PLAINTEXT_LISTENER: 'yes'\n"));
        assert!(rendered.contains("      ALLOW_ANONYMOUS_LOGIN: 'yes'\n"));
        assert!(!rendered.contains(": yes\n"));
        assert_eq!(top_level_keys(&rendered), vec!["services:"]);
    }

    #[test]
    fn test_rendered_manifest_all_switches_off() {
        let rendered = ComposeParser::render(&generate(&options(DatabaseKind::None)).unwrap()).unwrap();

        assert_eq!(top_level_keys(&rendered), vec!["services:"]);
        assert!(rendered.contains("  api:\n"));
        assert!(!rendered.contains("depends_on:"));
        assert!(!rendered.contains("volumes:"));
        assert!(!rendered.contains("networks:"));
    }

    #[test]
    fn test_invalid_options_produce_no_descriptor() {
        let mut opts = options(DatabaseKind::Mysql);
        opts.orm = Orm::Piccolo;
        assert!(matches!(generate(&opts), Err(StackforgeError::InvalidConfig(_))));

        let opts = ProjectOptions::new("not a name");
        assert!(matches!(generate(&opts), Err(StackforgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_generated_descriptors_validate() {
        for database in DatabaseKind::ALL {
            for orm in [Orm::Sqlalchemy, Orm::Tortoise, Orm::None] {
                let config = generate(&everything_on(database, orm)).unwrap();
                let warnings = ComposeParser::validate(&config).unwrap();
                assert!(warnings.is_empty(), "{:?}", warnings);

                let order = ComposeParser::startup_order(&config).unwrap();
                let pos = |s: &str| order.iter().position(|o| o == s).unwrap();
                assert!(pos("zookeeper") < pos("kafka"));
                assert!(pos("kafka") < pos("api"));
                if database.is_server() {
                    assert!(pos("db") < pos("migrator"));
                }
            }
        }
    }
}
