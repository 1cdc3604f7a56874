use anyhow::Result;
use std::sync::Arc;

use bukid_core::{AppError, ConfigError};
use bukid_weather::{
    farm_recommendations, precache, CacheStore, SystemGeolocator, WeatherError, WeatherService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    bukid_core::init()?;

    let mut app = match bukid_core::App::new() {
        Ok(app) => app,
        Err(e) => {
            if let Some(config_err) = e.downcast_ref::<ConfigError>() {
                eprintln!("{}", config_err.user_message());
            }
            return Err(e);
        }
    };
    for warning in &app.config_warnings().warnings {
        tracing::warn!("Config: {}", warning);
    }

    let store = CacheStore::open(app.config().cache_path())?;
    store.purge_expired()?;

    let service = Arc::new(WeatherService::new(
        &app.config().weather,
        Arc::new(store),
        Arc::new(SystemGeolocator),
    )?);
    let warmup = precache::spawn(service.clone());

    tracing::info!("Bukid started");

    if let Err(e) = report(&service).await {
        let err: AppError = e.into();
        eprintln!("{}", err.user_message());
    }

    warmup.join().await;
    app.shutdown()?;

    Ok(())
}

/// Print current conditions, the forecast, and field advice for the device location.
async fn report(service: &WeatherService) -> Result<(), WeatherError> {
    let here = service.get_current_location(true).await?;
    let (latitude, longitude) = (here.latitude(), here.longitude());

    let weather = service
        .get_weather_for_coordinates(latitude, longitude, false)
        .await?;
    println!("{}", here.location.name);
    println!(
        "  {}°C (feels like {}°C), {}",
        weather.display_temperature(),
        weather.display_feels_like(),
        weather.condition_label()
    );
    println!(
        "  Humidity {}%  Wind {:.0} km/h  UV {:.0}  Sunrise {}  Sunset {}",
        weather.humidity, weather.wind_speed, weather.uv_index, weather.sunrise, weather.sunset
    );
    if !weather.source.is_live() {
        println!("  (estimated: weather service unreachable)");
    }

    let days = service.settings().forecast_days;
    let forecast = service
        .get_forecast_for_coordinates(latitude, longitude, days)
        .await?;
    println!("\nForecast:");
    for day in &forecast.days {
        println!(
            "  {}  {:>3.0}° / {:>3.0}°  {:<14} rain {:>3}%",
            day.date.format("%a %b %d"),
            day.temp_max,
            day.temp_min,
            day.condition.description(),
            day.precipitation_probability
        );
    }

    let advisory = farm_recommendations(&weather);
    println!("\nField work: {}", advisory.status.as_str());
    for warning in &advisory.warnings {
        println!("  ! {}", warning);
    }
    for suggestion in &advisory.suggestions {
        println!("  - {}", suggestion);
    }

    Ok(())
}
