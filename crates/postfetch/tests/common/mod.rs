//! Shared model set: `Parent -> Object -> Thing`, each with a hook that
//! nulls its data fields.

#![allow(dead_code)]

use postfetch::prelude::*;

#[derive(Debug)]
pub struct Thing {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub objs: RelatedMany<Object>,
}

impl Thing {
    pub fn new(name: &str, age: i32, email: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
            age: Some(age),
            email: Some(email.to_string()),
            objs: RelatedMany::new("thing_id"),
        }
    }
}

impl Model for Thing {
    const TABLE_NAME: &'static str = "things";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] =
        &[RelationshipInfo::new("objs", "objects", RelationshipKind::OneToMany)
            .remote_key("thing_id")
            .related::<Object>()];

    fn fields() -> &'static [FieldInfo] {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", "id")
                .primary_key(true)
                .auto_increment(true)
                .nullable(true),
            FieldInfo::new("name", "name").nullable(true),
            FieldInfo::new("age", "age").nullable(true),
            FieldInfo::new("email", "email").nullable(true),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("name", Value::from(self.name.clone())),
            ("age", Value::from(self.age)),
            ("email", Value::from(self.email.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        let id: Option<i64> = row.get_named("id")?;
        Ok(Self {
            id,
            name: row.get_named("name")?,
            age: row.get_named("age")?,
            email: row.get_named("email")?,
            objs: match id {
                Some(id) => RelatedMany::with_parent_pk("thing_id", id),
                None => RelatedMany::new("thing_id"),
            },
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![Value::from(self.id)]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

impl PostFetch for Thing {
    fn post_fetch_hook(mut thing: Self) -> Result<Self> {
        thing.name = None;
        thing.age = None;
        thing.email = None;
        Ok(thing)
    }

    fn post_fetch_values_hook(values: ValueMap, fields: &[String]) -> Result<ValueMap> {
        Ok(values
            .into_keys()
            .zip(fields)
            .map(|(key, field)| (key, Value::Text(field.clone())))
            .collect())
    }

    fn post_fetch_values_list_hook(_values: Vec<Value>, fields: &[String]) -> Result<Vec<Value>> {
        Ok(fields.iter().map(|f| Value::Text(f.clone())).collect())
    }

    fn post_fetch_values_list_flat_hook(_value: Value, field: &str) -> Result<Value> {
        Ok(Value::from(field))
    }
}

impl Prefetch for Thing {
    fn prefetch_related<B: Backend>(
        db: &Database<B>,
        parents: &mut [Self],
        lookup: &PrefetchLookup,
    ) -> Result<()> {
        match lookup.name() {
            "objs" => prefetch_many(db, parents, lookup, |thing: &mut Thing| &mut thing.objs),
            _ => Err(unknown_prefetch::<Self>(lookup)),
        }
    }
}

#[derive(Debug)]
pub struct Object {
    pub id: Option<i64>,
    pub thing: Related<Thing>,
    pub identifier: Option<i32>,
    pub parents: RelatedMany<Parent>,
}

impl Object {
    pub fn new(thing_id: i64, identifier: i32) -> Self {
        Self {
            id: None,
            thing: Related::from_fk(thing_id),
            identifier: Some(identifier),
            parents: RelatedMany::new("obj_id"),
        }
    }
}

impl Model for Object {
    const TABLE_NAME: &'static str = "objects";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[
        RelationshipInfo::new("thing", "things", RelationshipKind::ManyToOne)
            .local_key("thing_id")
            .related::<Thing>(),
        RelationshipInfo::new("parents", "parents", RelationshipKind::OneToMany)
            .remote_key("obj_id")
            .related::<Parent>(),
    ];

    fn fields() -> &'static [FieldInfo] {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", "id")
                .primary_key(true)
                .auto_increment(true)
                .nullable(true),
            FieldInfo::new("thing", "thing_id").foreign_key("things.id"),
            FieldInfo::new("identifier", "identifier").nullable(true),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("thing_id", self.thing.fk().cloned().unwrap_or(Value::Null)),
            ("identifier", Value::from(self.identifier)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        let id: Option<i64> = row.get_named("id")?;
        Ok(Self {
            id,
            thing: Related::from_fk(row.get_named::<i64>("thing_id")?),
            identifier: row.get_named("identifier")?,
            parents: match id {
                Some(id) => RelatedMany::with_parent_pk("obj_id", id),
                None => RelatedMany::new("obj_id"),
            },
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![Value::from(self.id)]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }

    fn joined_mut(&mut self, name: &str) -> Option<&mut dyn JoinedRelation> {
        match name {
            "thing" => Some(&mut self.thing),
            _ => None,
        }
    }
}

impl PostFetch for Object {
    fn post_fetch_hook(mut obj: Self) -> Result<Self> {
        obj.identifier = None;
        Ok(obj)
    }
}

impl Prefetch for Object {
    fn prefetch_related<B: Backend>(
        db: &Database<B>,
        parents: &mut [Self],
        lookup: &PrefetchLookup,
    ) -> Result<()> {
        match lookup.name() {
            "parents" => prefetch_many(db, parents, lookup, |obj: &mut Object| &mut obj.parents),
            _ => Err(unknown_prefetch::<Self>(lookup)),
        }
    }
}

#[derive(Debug)]
pub struct Parent {
    pub id: Option<i64>,
    pub obj: Related<Object>,
    pub title: Option<String>,
}

impl Parent {
    pub fn new(obj_id: Option<i64>, title: &str) -> Self {
        Self {
            id: None,
            obj: Related::from_fk_opt(obj_id),
            title: Some(title.to_string()),
        }
    }
}

impl Model for Parent {
    const TABLE_NAME: &'static str = "parents";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];
    const RELATIONSHIPS: &'static [RelationshipInfo] =
        &[RelationshipInfo::new("obj", "objects", RelationshipKind::ManyToOne)
            .local_key("obj_id")
            .related::<Object>()];

    fn fields() -> &'static [FieldInfo] {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("id", "id")
                .primary_key(true)
                .auto_increment(true)
                .nullable(true),
            FieldInfo::new("obj", "obj_id")
                .nullable(true)
                .foreign_key("objects.id"),
            FieldInfo::new("title", "title").nullable(true),
        ];
        FIELDS
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("obj_id", self.obj.fk().cloned().unwrap_or(Value::Null)),
            ("title", Value::from(self.title.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            obj: Related::from_fk_opt(row.get_named::<Option<i64>>("obj_id")?),
            title: row.get_named("title")?,
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![Value::from(self.id)]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }

    fn joined_mut(&mut self, name: &str) -> Option<&mut dyn JoinedRelation> {
        match name {
            "obj" => Some(&mut self.obj),
            _ => None,
        }
    }
}

impl PostFetch for Parent {
    fn post_fetch_hook(mut parent: Self) -> Result<Self> {
        parent.title = None;
        Ok(parent)
    }
}

impl Prefetch for Parent {}

/// Primary keys of one seeded `Thing -> Object -> Parent` chain.
pub struct Seeded {
    pub thing: i64,
    pub obj: i64,
    pub parent: i64,
}

pub fn database() -> Database<MemoryBackend> {
    Database::new(MemoryBackend::new())
}

pub fn save_id<M: Model>(db: &Database<MemoryBackend>, model: &M) -> i64 {
    db.save(model)
        .expect("save")
        .as_i64()
        .expect("integer primary key")
}

pub fn seed_thing(db: &Database<MemoryBackend>) -> i64 {
    save_id(db, &Thing::new("foo", 12, "foo@bar.com"))
}

pub fn seed_chain(db: &Database<MemoryBackend>) -> Seeded {
    let thing = seed_thing(db);
    let obj = save_id(db, &Object::new(thing, 0));
    let parent = save_id(db, &Parent::new(Some(obj), "bar"));
    Seeded { thing, obj, parent }
}
