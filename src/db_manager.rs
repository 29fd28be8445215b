use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRecord {
    pub id: i64,
    pub letter: Option<String>,
    pub artist_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumRecord {
    pub id: i64,
    pub artist_id: i64,
    pub artist_name: String,
    pub album_name: String,
    pub release_year: Option<i64>,
    pub genre: Option<String>,
    pub rating: Option<f64>,
    pub cover_url: Option<String>,
}

pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    pub fn new() -> Result<Self, rusqlite::Error> {
        let data_dir = dirs::data_dir()
            .expect("Could not find data directory")
            .join("covervault");

        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).expect("Could not create data directory");
        }

        Self::open(data_dir.join("catalog.db"))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        db_manager.migrate()?;
        Ok(db_manager)
    }

    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        db_manager.migrate()?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS artists (
                id INTEGER PRIMARY KEY,
                letter TEXT,
                artist_name TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS albums (
                id INTEGER PRIMARY KEY,
                artist_id INTEGER NOT NULL,
                album_name TEXT NOT NULL,
                release_year INTEGER,
                genre TEXT,
                rating REAL,
                cover_url TEXT,
                FOREIGN KEY(artist_id) REFERENCES artists(id)
            )",
            [],
        )?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        // Catalogs created before cover resolution existed lack the
        // cover_url column.
        let mut stmt = self.conn.prepare("PRAGMA table_info(albums)")?;
        let columns = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut has_cover_url = false;
        for col in columns {
            if col? == "cover_url" {
                has_cover_url = true;
                break;
            }
        }

        if !has_cover_url {
            self.conn
                .execute("ALTER TABLE albums ADD COLUMN cover_url TEXT", [])?;
        }

        Ok(())
    }

    pub fn save_artist(
        &self,
        id: Option<i64>,
        letter: Option<&str>,
        artist_name: &str,
    ) -> Result<i64, rusqlite::Error> {
        match id {
            Some(id) => {
                self.conn.execute(
                    "UPDATE artists SET letter = ?1, artist_name = ?2 WHERE id = ?3",
                    params![letter, artist_name, id],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO artists (letter, artist_name) VALUES (?1, ?2)",
                    params![letter, artist_name],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    pub fn find_artist(&self, id: i64) -> Result<Option<ArtistRecord>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, letter, artist_name FROM artists WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ArtistRecord {
                        id: row.get(0)?,
                        letter: row.get(1)?,
                        artist_name: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn get_all_artists(&self) -> Result<Vec<ArtistRecord>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, letter, artist_name FROM artists ORDER BY artist_name ASC")?;
        let artist_iter = stmt.query_map([], |row| {
            Ok(ArtistRecord {
                id: row.get(0)?,
                letter: row.get(1)?,
                artist_name: row.get(2)?,
            })
        })?;

        let mut artists = Vec::new();
        for artist in artist_iter {
            artists.push(artist?);
        }
        Ok(artists)
    }

    pub fn delete_artist(&self, id: i64) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM albums WHERE artist_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM artists WHERE id = ?1", params![id])?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn save_album(
        &self,
        id: Option<i64>,
        artist_id: i64,
        album_name: &str,
        release_year: Option<i64>,
        genre: Option<&str>,
        rating: Option<f64>,
        cover_url: Option<&str>,
    ) -> Result<i64, rusqlite::Error> {
        match id {
            Some(id) => {
                self.conn.execute(
                    "UPDATE albums SET artist_id = ?1, album_name = ?2, release_year = ?3,
                        genre = ?4, rating = ?5, cover_url = ?6 WHERE id = ?7",
                    params![artist_id, album_name, release_year, genre, rating, cover_url, id],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO albums (artist_id, album_name, release_year, genre, rating, cover_url)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![artist_id, album_name, release_year, genre, rating, cover_url],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    pub fn find_album(&self, id: i64) -> Result<Option<AlbumRecord>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT albums.id, albums.artist_id, artists.artist_name, albums.album_name,
                    albums.release_year, albums.genre, albums.rating, albums.cover_url
                 FROM albums JOIN artists ON artists.id = albums.artist_id
                 WHERE albums.id = ?1",
                params![id],
                Self::album_from_row,
            )
            .optional()
    }

    pub fn get_all_albums(&self) -> Result<Vec<AlbumRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT albums.id, albums.artist_id, artists.artist_name, albums.album_name,
                albums.release_year, albums.genre, albums.rating, albums.cover_url
             FROM albums JOIN artists ON artists.id = albums.artist_id
             ORDER BY artists.artist_name ASC, albums.album_name ASC",
        )?;
        let album_iter = stmt.query_map([], Self::album_from_row)?;

        let mut albums = Vec::new();
        for album in album_iter {
            albums.push(album?);
        }
        Ok(albums)
    }

    pub fn delete_album(&self, id: i64) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM albums WHERE id = ?1", params![id])?;
        Ok(())
    }

    // Matches unset covers plus two placeholder shapes: the configured
    // default-cover sentinel and the spacer images older catalogs scraped.
    pub fn albums_missing_cover(
        &self,
        default_cover_path: &str,
    ) -> Result<Vec<AlbumRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT albums.id, albums.artist_id, artists.artist_name, albums.album_name,
                albums.release_year, albums.genre, albums.rating, albums.cover_url
             FROM albums JOIN artists ON artists.id = albums.artist_id
             WHERE albums.cover_url IS NULL
                OR albums.cover_url = ''
                OR albums.cover_url LIKE '%' || ?1 || '%'
                OR albums.cover_url LIKE '%' || ?2 || '%'
             ORDER BY artists.artist_name ASC, albums.album_name ASC",
        )?;
        let album_iter =
            stmt.query_map(params![default_cover_path, "spacer.gif"], Self::album_from_row)?;

        let mut albums = Vec::new();
        for album in album_iter {
            albums.push(album?);
        }
        Ok(albums)
    }

    pub fn update_album_cover(&self, id: i64, cover_url: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE albums SET cover_url = ?1 WHERE id = ?2",
            params![cover_url, id],
        )?;
        Ok(())
    }

    fn album_from_row(row: &rusqlite::Row<'_>) -> Result<AlbumRecord, rusqlite::Error> {
        Ok(AlbumRecord {
            id: row.get(0)?,
            artist_id: row.get(1)?,
            artist_name: row.get(2)?,
            album_name: row.get(3)?,
            release_year: row.get(4)?,
            genre: row.get(5)?,
            rating: row.get(6)?,
            cover_url: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::DbManager;
    use crate::cover_resolver::DEFAULT_COVER_PATH;

    fn sample_db() -> DbManager {
        DbManager::new_in_memory().expect("failed to create in-memory db")
    }

    #[test]
    fn test_save_and_find_artist_round_trips() {
        let db = sample_db();
        let id = db
            .save_artist(None, Some("Q"), "Queen")
            .expect("artist should save");

        let artist = db
            .find_artist(id)
            .expect("lookup should succeed")
            .expect("artist should exist");
        assert_eq!(artist.artist_name, "Queen");
        assert_eq!(artist.letter.as_deref(), Some("Q"));

        db.save_artist(Some(id), Some("Q"), "Queen + Adam Lambert")
            .expect("artist should update");
        let updated = db
            .find_artist(id)
            .expect("lookup should succeed")
            .expect("artist should exist");
        assert_eq!(updated.artist_name, "Queen + Adam Lambert");
    }

    #[test]
    fn test_get_all_artists_orders_by_name() {
        let db = sample_db();
        db.save_artist(None, Some("Q"), "Queen")
            .expect("artist should save");
        db.save_artist(None, Some("A"), "ABBA")
            .expect("artist should save");

        let artists = db.get_all_artists().expect("listing should succeed");
        let names: Vec<&str> = artists
            .iter()
            .map(|artist| artist.artist_name.as_str())
            .collect();
        assert_eq!(names, vec!["ABBA", "Queen"]);
    }

    #[test]
    fn test_find_album_joins_artist_name() {
        let db = sample_db();
        let artist_id = db
            .save_artist(None, Some("Q"), "Queen")
            .expect("artist should save");
        let album_id = db
            .save_album(
                None,
                artist_id,
                "A Night at the Opera",
                Some(1975),
                Some("Rock"),
                Some(4.8),
                Some("https://img.example/opera.jpg"),
            )
            .expect("album should save");

        let album = db
            .find_album(album_id)
            .expect("lookup should succeed")
            .expect("album should exist");
        assert_eq!(album.artist_name, "Queen");
        assert_eq!(album.album_name, "A Night at the Opera");
        assert_eq!(album.release_year, Some(1975));
        assert_eq!(album.cover_url.as_deref(), Some("https://img.example/opera.jpg"));
    }

    #[test]
    fn test_albums_missing_cover_matches_placeholder_variants() {
        let db = sample_db();
        let artist_id = db
            .save_artist(None, Some("Q"), "Queen")
            .expect("artist should save");

        let unset = db
            .save_album(None, artist_id, "Unset", None, None, None, None)
            .expect("album should save");
        let empty = db
            .save_album(None, artist_id, "Empty", None, None, None, Some(""))
            .expect("album should save");
        let placeholder = db
            .save_album(None, artist_id, "Placeholder", None, None, None, Some(DEFAULT_COVER_PATH))
            .expect("album should save");
        let spacer = db
            .save_album(
                None,
                artist_id,
                "Spacer",
                None,
                None,
                None,
                Some("https://img.example/spacer.gif?x=1"),
            )
            .expect("album should save");
        let resolved = db
            .save_album(
                None,
                artist_id,
                "Resolved",
                None,
                None,
                None,
                Some("https://img.example/real.jpg"),
            )
            .expect("album should save");

        let missing = db
            .albums_missing_cover(DEFAULT_COVER_PATH)
            .expect("missing-cover query should succeed");
        let ids: Vec<i64> = missing.iter().map(|album| album.id).collect();
        assert!(ids.contains(&unset));
        assert!(ids.contains(&empty));
        assert!(ids.contains(&placeholder));
        assert!(ids.contains(&spacer));
        assert!(!ids.contains(&resolved));
    }

    #[test]
    fn test_update_album_cover_clears_it_from_missing_set() {
        let db = sample_db();
        let artist_id = db
            .save_artist(None, Some("Q"), "Queen")
            .expect("artist should save");
        let album_id = db
            .save_album(None, artist_id, "Jazz", Some(1978), None, None, None)
            .expect("album should save");

        let missing = db
            .albums_missing_cover(DEFAULT_COVER_PATH)
            .expect("query should succeed");
        assert_eq!(missing.len(), 1);
        db.update_album_cover(album_id, "https://img.example/jazz.jpg")
            .expect("cover update should succeed");
        let missing = db
            .albums_missing_cover(DEFAULT_COVER_PATH)
            .expect("query should succeed");
        assert!(missing.is_empty());
    }

    #[test]
    fn test_delete_album_leaves_artist_in_place() {
        let db = sample_db();
        let artist_id = db
            .save_artist(None, Some("Q"), "Queen")
            .expect("artist should save");
        let album_id = db
            .save_album(None, artist_id, "Jazz", None, None, None, None)
            .expect("album should save");

        db.delete_album(album_id).expect("delete should succeed");
        assert!(db
            .find_album(album_id)
            .expect("lookup should succeed")
            .is_none());
        assert!(db
            .find_artist(artist_id)
            .expect("lookup should succeed")
            .is_some());
    }

    #[test]
    fn test_delete_artist_removes_its_albums() {
        let db = sample_db();
        let artist_id = db
            .save_artist(None, Some("Q"), "Queen")
            .expect("artist should save");
        let album_id = db
            .save_album(None, artist_id, "Jazz", None, None, None, None)
            .expect("album should save");

        db.delete_artist(artist_id).expect("delete should succeed");
        assert!(db
            .find_album(album_id)
            .expect("lookup should succeed")
            .is_none());
        assert!(db
            .find_artist(artist_id)
            .expect("lookup should succeed")
            .is_none());
    }

    #[test]
    fn test_migrate_adds_cover_url_to_older_catalogs() {
        let conn = Connection::open_in_memory().expect("in-memory connection should open");
        conn.execute_batch(
            "CREATE TABLE artists (
                id INTEGER PRIMARY KEY,
                letter TEXT,
                artist_name TEXT NOT NULL
            );
            CREATE TABLE albums (
                id INTEGER PRIMARY KEY,
                artist_id INTEGER NOT NULL,
                album_name TEXT NOT NULL,
                release_year INTEGER,
                genre TEXT,
                rating REAL,
                FOREIGN KEY(artist_id) REFERENCES artists(id)
            );
            INSERT INTO artists (letter, artist_name) VALUES ('Q', 'Queen');
            INSERT INTO albums (artist_id, album_name) VALUES (1, 'Jazz');",
        )
        .expect("legacy schema should build");

        let db = DbManager { conn };
        db.initialize_schema().expect("schema init should succeed");
        db.migrate().expect("migration should succeed");

        let album = db
            .find_album(1)
            .expect("lookup should succeed")
            .expect("album should exist");
        assert!(album.cover_url.is_none());

        db.update_album_cover(1, "https://img.example/jazz.jpg")
            .expect("cover update should succeed");
        let missing = db
            .albums_missing_cover(DEFAULT_COVER_PATH)
            .expect("query should succeed");
        assert!(missing.is_empty());
    }
}
