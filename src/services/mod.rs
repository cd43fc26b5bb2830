//! External collaborators of the household app.
//!
//! - [`blob`]: file storage for photos and news images.
//! - [`notify`]: permission-gated local notifications.
//! - [`weather`]: OpenWeatherMap client and forecast helpers.

pub mod blob;
pub mod notify;
pub mod weather;

pub use blob::{list_photos, unique_name, BlobEntry, BlobStore, MemoryBlobStore, Photo};
pub use notify::{MemorySink, Notification, NotificationSink, Notifier, Permission};
pub use weather::{
    daily_outlook, hourly_outlook, icon_url, Coordinates, CurrentWeather, DailyOutlook, Forecast,
    HourlyOutlook, OpenWeatherMap, WeatherSource,
};
