//! Known store extension kinds and their parameter templates, used by the
//! console's store-creation form.

use once_cell::sync::Lazy;

use crate::registry::{Pair, StoreDescriptor, StoreKind};

pub const KIND_GIT: &str = "atest-store-git";
pub const KIND_S3: &str = "atest-store-s3";
pub const KIND_ORM: &str = "atest-store-orm";
pub const KIND_ETCD: &str = "atest-store-etcd";
pub const KIND_REDIS: &str = "atest-store-redis";
pub const KIND_MONGODB: &str = "atest-store-mongodb";
pub const KIND_CASSANDRA: &str = "atest-store-cassandra";
pub const KIND_ELASTICSEARCH: &str = "atest-store-elasticsearch";

/// Database drivers the ORM extension understands.
pub struct Driver;

impl Driver {
    pub const MYSQL: &'static str = "mysql";
    pub const POSTGRES: &'static str = "postgres";
    pub const SQLITE: &'static str = "sqlite";
    pub const CASSANDRA: &'static str = "cassandra";
}

/// Resolve the database driver a store descriptor implies. ORM stores carry
/// it as a property (defaulting to mysql), Cassandra stores imply their own,
/// everything else has none.
#[must_use]
pub fn driver_name(store: &StoreDescriptor) -> &str {
    match store.kind.name.as_str() {
        KIND_ORM => store.property("driver").unwrap_or(Driver::MYSQL),
        KIND_CASSANDRA => Driver::CASSANDRA,
        _ => "",
    }
}

fn param(key: &str) -> Pair {
    Pair {
        key: key.to_string(),
        value: String::new(),
        description: None,
    }
}

fn param_with_description(key: &str, description: &str) -> Pair {
    Pair {
        key: key.to_string(),
        value: String::new(),
        description: Some(description.to_string()),
    }
}

fn extension(name: &str, link: &str, params: Vec<Pair>) -> StoreDescriptor {
    StoreDescriptor {
        name: name.to_string(),
        kind: StoreKind {
            name: name.to_string(),
            description: String::new(),
        },
        link: link.to_string(),
        params,
        ..StoreDescriptor::default()
    }
}

static STORE_EXTENSIONS: Lazy<Vec<StoreDescriptor>> = Lazy::new(|| {
    vec![
        extension(
            KIND_GIT,
            "https://github.com/LinuxSuRen/atest-ext-store-git",
            vec![
                param("insecure"),
                param("timeout"),
                param("targetpath"),
                param("branch"),
                param_with_description("email", "See also: git config --local user.email"),
                param_with_description("name", "See also: git config --local user.name"),
            ],
        ),
        extension(
            KIND_S3,
            "https://github.com/LinuxSuRen/atest-ext-store-s3",
            vec![
                param("accesskeyid"),
                param("secretaccesskey"),
                param("sessiontoken"),
                param("region"),
                param("disablessl"),
                param("forcepathstyle"),
                param("bucket"),
            ],
        ),
        extension(
            KIND_ORM,
            "https://github.com/LinuxSuRen/atest-ext-store-orm",
            vec![
                param_with_description("driver", "Supported: mysql, postgres, sqlite"),
                param("database"),
                param_with_description("historyLimit", "Limit of the history record count"),
            ],
        ),
        extension(
            KIND_ETCD,
            "https://github.com/LinuxSuRen/atest-ext-store-etcd",
            vec![],
        ),
        extension(
            KIND_REDIS,
            "https://github.com/LinuxSuRen/atest-ext-store-redis",
            vec![],
        ),
        extension(
            KIND_MONGODB,
            "https://github.com/LinuxSuRen/atest-ext-store-mongodb",
            vec![param("collection"), param("database")],
        ),
        extension(
            KIND_CASSANDRA,
            "https://github.com/LinuxSuRen/atest-ext-store-cassandra",
            vec![param("keyspace")],
        ),
        extension(
            KIND_ELASTICSEARCH,
            "https://github.com/LinuxSuRen/atest-ext-store-elasticsearch",
            vec![],
        ),
    ]
});

#[must_use]
pub fn supported_extensions() -> &'static [StoreDescriptor] {
    &STORE_EXTENSIONS
}

#[must_use]
pub fn supported_extension(name: &str) -> Option<&'static StoreDescriptor> {
    STORE_EXTENSIONS
        .iter()
        .find(|extension| extension.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orm_driver_defaults_to_mysql() {
        let mut store = StoreDescriptor::default();
        store.kind.name = KIND_ORM.to_string();
        assert_eq!(driver_name(&store), Driver::MYSQL);
    }

    #[test]
    fn orm_driver_reads_the_property() {
        let mut store = StoreDescriptor::default();
        store.kind.name = KIND_ORM.to_string();
        store.properties.push(Pair {
            key: "driver".to_string(),
            value: Driver::POSTGRES.to_string(),
            description: None,
        });
        assert_eq!(driver_name(&store), Driver::POSTGRES);
    }

    #[test]
    fn cassandra_kind_implies_its_driver() {
        let mut store = StoreDescriptor::default();
        store.kind.name = KIND_CASSANDRA.to_string();
        assert_eq!(driver_name(&store), Driver::CASSANDRA);
    }

    #[test]
    fn unknown_kinds_have_no_driver() {
        let store = StoreDescriptor::default();
        assert_eq!(driver_name(&store), "");
    }

    #[test]
    fn extension_lookup_by_name() {
        let git = supported_extension(KIND_GIT).expect("git extension");
        assert!(git.params.iter().any(|pair| pair.key == "branch"));
        assert_eq!(supported_extension("no-such-kind"), None);
    }

    #[test]
    fn extension_table_names_are_unique() {
        let mut names: Vec<_> = supported_extensions()
            .iter()
            .map(|extension| extension.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), supported_extensions().len());
    }
}
