//! Chemical elements and physical constants used by material computations

/// Avogadro constant (1/mol)
pub const AVOGADRO: f64 = 6.022_140_76e23;
/// Electron rest mass energy (MeV)
pub const ELECTRON_MASS_MEV: f64 = 0.510_998_95;
/// Classical electron radius (mm)
pub const CLASSICAL_ELECTRON_RADIUS_MM: f64 = 2.817_940_326_2e-12;
/// Fine structure constant
pub const FINE_STRUCTURE: f64 = 7.297_352_569_3e-3;

/// A chemical element available to material compositions
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Element {
    pub name: &'static str,
    /// Atomic number Z
    pub atomic_number: u8,
    /// Molar mass (g/mol)
    pub molar_mass: f64,
    /// Mean excitation energy (eV)
    pub mean_excitation_energy: f64,
}

impl Element {
    const fn new(
        name: &'static str,
        atomic_number: u8,
        molar_mass: f64,
        mean_excitation_energy: f64,
    ) -> Self {
        Self {
            name,
            atomic_number,
            molar_mass,
            mean_excitation_energy,
        }
    }

    /// Look up an element by its English name (case-insensitive)
    pub fn by_name(name: &str) -> Option<&'static Element> {
        ELEMENTS.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn by_atomic_number(z: u8) -> Option<&'static Element> {
        ELEMENTS.get(usize::from(z).checked_sub(1)?)
    }
}

/// Periodic table, ordered by atomic number
pub static ELEMENTS: [Element; 118] = [
    Element::new("Hydrogen", 1, 1.00794258759021, 19.2),
    Element::new("Helium", 2, 4.00256163944925, 41.8),
    Element::new("Lithium", 3, 6.94107031304227, 40.0),
    Element::new("Beryllium", 4, 9.01225666906993, 63.7),
    Element::new("Boron", 5, 10.8119796734782, 76.0),
    Element::new("Carbon", 6, 12.0110501661529, 81.0),
    Element::new("Nitrogen", 7, 14.006723227149, 82.0),
    Element::new("Oxygen", 8, 15.999360025599, 95.0),
    Element::new("Fluorine", 9, 18.9985645529004, 115.0),
    Element::new("Neon", 10, 20.1795984259913, 137.0),
    Element::new("Sodium", 11, 22.9899471231216, 149.0),
    Element::new("Magnesium", 12, 24.3047819658518, 156.0),
    Element::new("Aluminium", 13, 26.9815902534194, 166.0),
    Element::new("Silicon", 14, 28.0853795538437, 173.0),
    Element::new("Phosphor", 15, 30.9738168001982, 173.0),
    Element::new("Sulfur", 16, 32.0660560755156, 180.0),
    Element::new("Chlorine", 17, 35.4528581260036, 174.0),
    Element::new("Argon", 18, 39.9476242260148, 188.0),
    Element::new("Potassium", 19, 39.098672702953, 190.0),
    Element::new("Calcium", 20, 40.077750836623, 191.0),
    Element::new("Scandium", 21, 44.9563281383799, 216.0),
    Element::new("Titanium", 22, 47.8802124140333, 233.0),
    Element::new("Vandium", 23, 50.9413067552602, 245.0),
    Element::new("Chromium", 24, 51.9964469094612, 257.0),
    Element::new("Manganese", 25, 54.9378103986288, 272.0),
    Element::new("Iron", 26, 55.8467222269954, 286.0),
    Element::new("Cobalt", 27, 58.9326639746808, 297.0),
    Element::new("Nickel", 28, 58.6903663955731, 311.0),
    Element::new("Copper", 29, 63.5463230782715, 322.0),
    Element::new("Zinc", 30, 65.3893938403191, 330.0),
    Element::new("Gallium", 31, 69.7224596284468, 334.0),
    Element::new("Germanium", 32, 72.6101064191872, 350.0),
    Element::new("Arsenic", 33, 74.9216727966217, 347.0),
    Element::new("Selenium", 34, 78.9595912679981, 348.0),
    Element::new("Bromine", 35, 79.903202976965, 343.0),
    Element::new("Krypton", 36, 83.8008333527317, 352.0),
    Element::new("Rubidium", 37, 85.4681111547435, 363.0),
    Element::new("Strontium", 38, 87.6201895363047, 366.0),
    Element::new("Yttrium", 39, 88.9050995053229, 379.0),
    Element::new("Zirconium", 40, 91.2242291552636, 393.0),
    Element::new("Niobium", 41, 92.9073192839338, 417.0),
    Element::new("Molybdenum", 42, 95.9407908262329, 424.0),
    Element::new("Technetium", 43, 97.9075115553633, 428.0),
    Element::new("Ruthenium", 44, 101.070427711674, 441.0),
    Element::new("Rhodium", 45, 102.906537995381, 449.0),
    Element::new("Palladium", 46, 106.41989589358, 470.0),
    Element::new("Silver", 47, 107.867437804094, 470.0),
    Element::new("Cadmium", 48, 112.412177985948, 469.0),
    Element::new("Indium", 49, 114.818633423939, 488.0),
    Element::new("Tin", 50, 118.708452041785, 488.0),
    Element::new("Antimony", 51, 121.750340184774, 487.0),
    Element::new("Tellurium", 52, 127.601099332548, 485.0),
    Element::new("Iodine", 53, 126.903553299492, 491.0),
    Element::new("Xenon", 54, 131.291028446389, 482.0),
    Element::new("Caesium", 55, 132.904815987241, 488.0),
    Element::new("Barium", 56, 137.325584246794, 491.0),
    Element::new("Lanthanum", 57, 138.905812111612, 501.0),
    Element::new("Cerium", 58, 140.113540282643, 523.0),
    Element::new("Praseodymium", 59, 140.908982350553, 535.0),
    Element::new("Neodymium", 60, 144.24117123831, 546.0),
    Element::new("Promethium", 61, 144.913764431986, 560.0),
    Element::new("Samarium", 62, 150.361352282097, 574.0),
    Element::new("Europium", 63, 151.964686301469, 580.0),
    Element::new("Gadolinium", 64, 157.252020934175, 591.0),
    Element::new("Terbium", 65, 158.924205378973, 614.0),
    Element::new("Dysprosium", 66, 162.50153884033, 628.0),
    Element::new("Holmium", 67, 164.931196612756, 650.0),
    Element::new("Erbium", 68, 167.261099495757, 658.0),
    Element::new("Thulium", 69, 168.935461756929, 674.0),
    Element::new("Ytterbium", 70, 173.040318394186, 684.0),
    Element::new("Lutetium", 71, 174.967347642869, 694.0),
    Element::new("Hafnium", 72, 178.491744756805, 705.0),
    Element::new("Tantalum", 73, 180.948367746573, 718.0),
    Element::new("Tungsten", 74, 183.850931677019, 727.0),
    Element::new("Rhenium", 75, 186.205869208997, 736.0),
    Element::new("Osmium", 76, 190.19970969518, 746.0),
    Element::new("Iridium", 77, 192.221279145239, 757.0),
    Element::new("Platinum", 78, 195.078031212485, 790.0),
    Element::new("Gold", 79, 196.968185898075, 790.0),
    Element::new("Mercury", 80, 200.591745649666, 800.0),
    Element::new("Thallium", 81, 204.385455830032, 810.0),
    Element::new("Lead", 82, 207.201516108654, 823.0),
    Element::new("Bismuth", 83, 208.978523050583, 823.0),
    Element::new("Polonium", 84, 208.981216569225, 830.0),
    Element::new("Astatine", 85, 209.98542454112, 825.0),
    Element::new("Radon", 86, 222.015695993391, 794.0),
    Element::new("Francium", 87, 223.019738528582, 827.0),
    Element::new("Radium", 88, 226.023526994401, 826.0),
    Element::new("Actinium", 89, 227.029233202388, 841.0),
    Element::new("Thorium", 90, 232.036507077113, 847.0),
    Element::new("Protactinium", 91, 231.034832944044, 878.0),
    Element::new("Uranium", 92, 238.027476650022, 890.0),
    Element::new("Neptunium", 93, 237.0, 902.0),
    Element::new("Plutonium", 94, 244.0, 921.0),
    Element::new("Americium", 95, 243.0, 934.0),
    Element::new("Curium", 96, 247.0, 939.0),
    Element::new("Berkelium", 97, 247.0, 952.0),
    Element::new("Californium", 98, 251.0, 966.0),
    Element::new("Einsteinium", 99, 252.0, 980.0),
    Element::new("Fermium", 100, 257.0, 994.0),
    Element::new("Mendelevium", 101, 258.0, 1007.0),
    Element::new("Nobelium", 102, 259.0, 1020.0),
    Element::new("Lawrencium", 103, 266.0, 1034.0),
    Element::new("Rutherfordium", 104, 267.0, 1047.0),
    Element::new("Dubnium", 105, 268.0, 1061.0),
    Element::new("Seaborgium", 106, 269.0, 1074.0),
    Element::new("Bohrium", 107, 270.0, 1087.0),
    Element::new("Hassium", 108, 269.0, 1102.0),
    Element::new("Meitnerium", 109, 278.0, 1115.0),
    Element::new("Darmstadtium", 110, 281.0, 1129.0),
    Element::new("Roentgenium", 111, 282.0, 1143.0),
    Element::new("Copernicium", 112, 285.0, 1156.0),
    Element::new("Nihonium", 113, 286.0, 1171.0),
    Element::new("Flerovium", 114, 289.0, 1185.0),
    Element::new("Moscovium", 115, 290.0, 1199.0),
    Element::new("Livermorium", 116, 293.0, 1213.0),
    Element::new("Tennessine", 117, 294.0, 1227.0),
    Element::new("Oganesson", 118, 294.0, 1242.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_ordered_by_z() {
        for (i, element) in ELEMENTS.iter().enumerate() {
            assert_eq!(usize::from(element.atomic_number), i + 1);
        }
    }

    #[test]
    fn test_lookup() {
        let oxygen = Element::by_name("oxygen").unwrap();
        assert_eq!(oxygen.atomic_number, 8);
        assert_eq!(Element::by_atomic_number(8), Some(oxygen));
        assert!(Element::by_name("Unobtainium").is_none());
        assert!(Element::by_atomic_number(0).is_none());
        assert!(Element::by_atomic_number(119).is_none());
    }
}
