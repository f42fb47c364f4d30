use cinesync_core::cinema::{require_positive, require_text, CreateMovie, Movie, UpdateMovie, ValidationError};
use cinesync_core::store::Order;

use crate::collection::{CollectionCache, Resource};

/// The film catalogue (`pelicula`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Movies;

impl Resource for Movies {
    type Record = Movie;
    type Create = CreateMovie;
    type Patch = UpdateMovie;

    const TABLE: &'static str = "pelicula";
    const PRIMARY_KEY: &'static str = "pelicula_id";

    fn order(&self) -> Vec<Order> {
        vec![Order::asc("titulo")]
    }

    fn prepare_create(&self, input: CreateMovie) -> Result<CreateMovie, ValidationError> {
        require_text("title", &input.title)?;
        require_positive("duration", f64::from(input.duration))?;
        Ok(input)
    }

    fn prepare_patch(&self, patch: UpdateMovie) -> Result<UpdateMovie, ValidationError> {
        if let Some(title) = &patch.title {
            require_text("title", title)?;
        }
        if let Some(duration) = patch.duration {
            require_positive("duration", f64::from(duration))?;
        }
        Ok(patch)
    }
}

impl CollectionCache<Movies> {
    /// Movies currently on the billboard.
    pub fn showing(&self) -> Vec<Movie> {
        self.snapshot()
            .iter()
            .filter(|movie| movie.active)
            .cloned()
            .collect()
    }
}
