use crate::models::db_operations::kv_db_operations::{write_record, DbError, KvStore};
use crate::models::{BlogPost, ModerationState, Submission, SubmissionStatus, TestimonialSubmission};
use chrono::{DateTime, TimeZone, Utc};

fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn sample_blog_posts() -> Vec<BlogPost> {
    vec![
        BlogPost {
            id: "blog_1".to_string(),
            title: "The Secret Life of Forest Mushrooms".to_string(),
            excerpt: "Discover the fascinating world of fungi and their crucial role in forest ecosystems. From decomposition to symbiotic relationships...".to_string(),
            content: "Mushrooms are the visible fruiting bodies of vast underground fungal networks that form the backbone of forest ecosystems...".to_string(),
            category: "Ecology".to_string(),
            image_url: "https://images.unsplash.com/photo-1459262838948-3e2de6c1ec80?w=600&h=400&fit=crop".to_string(),
            author: "Dr. Sarah Martinez".to_string(),
            created_at: day(2025, 1, 15),
            read_time: "5 min read".to_string(),
        },
        BlogPost {
            id: "blog_2".to_string(),
            title: "Migration Patterns of Wild Haven Birds".to_string(),
            excerpt: "Follow the incredible journey of migratory birds through our reserve. Learn about their navigation systems and seasonal patterns...".to_string(),
            content: "Every spring and fall, Wild Haven Reserve becomes a crucial stopover point for thousands of migratory birds...".to_string(),
            category: "Wildlife".to_string(),
            image_url: "https://images.unsplash.com/photo-1560114928-40f1f1eb26a0?w=600&h=400&fit=crop".to_string(),
            author: "Mike Thompson".to_string(),
            created_at: day(2025, 1, 10),
            read_time: "7 min read".to_string(),
        },
        BlogPost {
            id: "blog_3".to_string(),
            title: "Night Photography Tips in the Wild".to_string(),
            excerpt: "Master the art of capturing nocturnal wildlife. Equipment recommendations, techniques, and safety considerations for night shoots...".to_string(),
            content: "Photographing wildlife at night presents unique challenges and incredible opportunities...".to_string(),
            category: "Photography".to_string(),
            image_url: "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=600&h=400&fit=crop".to_string(),
            author: "Lisa Chen".to_string(),
            created_at: day(2025, 1, 5),
            read_time: "6 min read".to_string(),
        },
    ]
}

pub fn sample_testimonials() -> Vec<TestimonialSubmission> {
    let approved = |created_at| ModerationState {
        status: SubmissionStatus::Approved,
        created_at,
        moderated_at: None,
        moderated_by: None,
    };

    vec![
        TestimonialSubmission {
            id: "testimonial_1".to_string(),
            name: "Emily Rodriguez".to_string(),
            role: "Nature Photographer".to_string(),
            email: "emily@example.com".to_string(),
            rating: 5,
            text: "Wild Haven Reserve is a photographer's paradise. The diversity of wildlife and pristine landscapes provide endless opportunities for capturing stunning images.".to_string(),
            moderation: approved(day(2025, 1, 1)),
        },
        TestimonialSubmission {
            id: "testimonial_2".to_string(),
            name: "Dr. James Wilson".to_string(),
            role: "Marine Biologist".to_string(),
            email: "james@example.com".to_string(),
            rating: 5,
            text: "As a researcher, I've visited many natural reserves, but Wild Haven stands out for its commitment to preservation and education.".to_string(),
            moderation: approved(day(2025, 1, 2)),
        },
    ]
}

/// Writes the fixed sample content. Fixed ids make reseeding overwrite in place.
pub fn seed(store: &dyn KvStore) -> Result<(), DbError> {
    for post in sample_blog_posts() {
        write_record(store, &post.id, &post)?;
    }
    for testimonial in sample_testimonials() {
        let id = testimonial.id.clone();
        write_record(store, &id, &Submission::Testimonial(testimonial))?;
    }
    log::info!("Seeded sample blog posts and testimonials");
    Ok(())
}
